use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::jobs::JobExecutionLog;
use crate::AppState;

pub fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logs", get(list_execution_logs))
        .route("/:job/run", post(run_job))
}

async fn list_execution_logs(State(state): State<Arc<AppState>>) -> Json<Vec<JobExecutionLog>> {
    Json(state.scheduler.get_execution_logs().await)
}

async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(job): Path<String>,
) -> ApiResult<Json<JobExecutionLog>> {
    Ok(Json(state.scheduler.run_job_now(&job).await?))
}
