// Lead Scoring Module
// Weighted five-factor scoring, grading and score-tier routing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use realty_shared::Lead;

pub mod config;
pub mod factors;
pub mod grade;
pub mod router;
pub mod service;

pub use config::{RoutingConfig, ScoringConfig};
pub use router::{RoutingDecision, RoutingOutcome, ScoreTierRouter};
pub use service::{BulkScoreReport, LeadScoringService, ScoreResult, ScoringError};

/// Everything the factor calculators read for one lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringInputs {
    pub lead: Lead,
    pub email_opens: i64,
    pub clicks: i64,
    pub completed_site_visits: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
}
