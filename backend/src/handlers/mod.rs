use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use std::sync::Arc;

use crate::{database, AppState};

pub mod automation;
pub mod campaigns;
pub mod jobs;
pub mod scoring;
pub mod workflows;

pub use automation::automation_routes;
pub use campaigns::campaign_routes;
pub use jobs::job_routes;
pub use scoring::lead_score_routes;
pub use workflows::workflow_routes;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let healthy = database::health_check(&state.db_pool).await;
    let pool = database::get_pool_stats(&state.db_pool);

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "realty-automation",
            "database": {
                "connected": healthy,
                "pool": pool
            }
        })),
    )
}
