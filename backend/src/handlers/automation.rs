use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{validation_error, ApiError, ApiResult};
use crate::workflows::{CascadeOutcome, EventPayload, EventSource, TriggerEvent, TriggerOutcome, TriggerType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    /// Follow events emitted by actions, bounded by the chain depth
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DispatchResponse {
    Single(TriggerOutcome),
    Cascade(CascadeOutcome),
}

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new().route("/events/:event", post(dispatch_event))
}

/// Entity controllers call this after committing their own change.
async fn dispatch_event(
    State(state): State<Arc<AppState>>,
    Path(event): Path<String>,
    Query(query): Query<DispatchQuery>,
    Json(body): Json<Value>,
) -> ApiResult<Json<DispatchResponse>> {
    let trigger: TriggerType = event.parse().map_err(ApiError::bad_request)?;
    let payload = EventPayload::from_value(body);

    if payload.entity_type().is_none() {
        return Err(validation_error("entity_type", "entity_type is required"));
    }
    if payload.entity_id().is_none() {
        return Err(validation_error("entity_id", "entity_id must be a UUID"));
    }

    let response = if query.cascade {
        DispatchResponse::Cascade(state.engine.process_cascade(trigger, payload).await?)
    } else {
        let event = TriggerEvent::new(trigger, payload, EventSource::Api);
        DispatchResponse::Single(state.engine.process_event(event).await?)
    };

    Ok(Json(response))
}
