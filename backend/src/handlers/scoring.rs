use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

use realty_shared::LeadScoreRecord;

use crate::error::ApiResult;
use crate::scoring::{BulkScoreReport, ScoreResult};
use crate::AppState;

pub fn lead_score_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scores/recalculate", post(recalculate_scores))
        .route("/:id/score", get(get_lead_score).post(calculate_lead_score))
}

async fn calculate_lead_score(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<Json<ScoreResult>> {
    Ok(Json(state.scoring.calculate_score(lead_id).await?))
}

async fn get_lead_score(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<Uuid>,
) -> ApiResult<Json<LeadScoreRecord>> {
    Ok(Json(state.scoring.get_score(lead_id).await?))
}

async fn recalculate_scores(State(state): State<Arc<AppState>>) -> ApiResult<Json<BulkScoreReport>> {
    Ok(Json(state.scoring.bulk_calculate_scores().await?))
}
