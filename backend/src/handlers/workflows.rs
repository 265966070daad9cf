use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::workflows::{WorkflowRule, WorkflowRuleInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnabledUpdate {
    pub enabled: bool,
}

pub fn workflow_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/:id", get(get_workflow).put(update_workflow).delete(delete_workflow))
        .route("/:id/enabled", put(set_workflow_enabled))
}

async fn list_workflows(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<WorkflowRule>>> {
    Ok(Json(state.workflows.list_rules().await?))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WorkflowRuleInput>,
) -> ApiResult<(StatusCode, Json<WorkflowRule>)> {
    payload.validate()?;

    let rule = state.workflows.create_rule(payload).await?;
    tracing::info!("Created workflow '{}' ({}) on {}", rule.name, rule.id, rule.trigger_event);
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn get_workflow(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkflowRule>> {
    Ok(Json(state.workflows.get_rule(id).await?))
}

async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WorkflowRuleInput>,
) -> ApiResult<Json<WorkflowRule>> {
    payload.validate()?;
    Ok(Json(state.workflows.update_rule(id, payload).await?))
}

async fn set_workflow_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EnabledUpdate>,
) -> ApiResult<Json<WorkflowRule>> {
    let rule = state.workflows.set_enabled(id, payload.enabled).await?;
    tracing::info!("Workflow {} enabled={}", id, rule.enabled);
    Ok(Json(rule))
}

async fn delete_workflow(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    state.workflows.delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
