use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiResult;
use crate::services::{BulkSendReport, Channel};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct BroadcastRequest {
    pub channel: Channel,
    /// Email only; ignored for SMS and WhatsApp
    #[serde(default)]
    pub subject: String,
    /// Rendered per recipient, e.g. "Hi {{recipient.name}}"
    #[validate(length(min = 1, message = "body must not be empty"))]
    pub body: String,
}

pub fn campaign_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/broadcast", post(broadcast))
}

async fn broadcast(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<BroadcastRequest>,
) -> ApiResult<Json<BulkSendReport>> {
    payload.validate()?;

    let report = state
        .bulk_sender
        .broadcast(campaign_id, payload.channel, &payload.subject, &payload.body)
        .await?;
    Ok(Json(report))
}
