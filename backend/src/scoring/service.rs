// Lead Scoring Service - Score, grade, persist and route

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use realty_shared::LeadScoreRecord;

use super::config::ScoringConfig;
use super::factors::compute_factors;
use super::grade::grade_for;
use super::router::{RoutingOutcome, ScoreTierRouter};
use crate::repositories::{LeadStore, StoreError};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("lead '{0}' not found")]
    NotFound(Uuid),

    #[error("lead store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResult {
    #[serde(flatten)]
    pub record: LeadScoreRecord,
    /// Absent when scoring ran without side effects
    pub routing: Option<RoutingOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkScoreFailure {
    pub lead_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkScoreReport {
    pub results: Vec<ScoreResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BulkScoreFailure>,
}

pub struct LeadScoringService {
    leads: Arc<dyn LeadStore>,
    router: Option<Arc<ScoreTierRouter>>,
    config: Arc<ScoringConfig>,
    bulk_concurrency: usize,
}

impl LeadScoringService {
    pub fn new(leads: Arc<dyn LeadStore>, config: Arc<ScoringConfig>) -> Self {
        Self {
            leads,
            router: None,
            config,
            bulk_concurrency: 4,
        }
    }

    pub fn with_router(mut self, router: Arc<ScoreTierRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_bulk_concurrency(mut self, concurrency: usize) -> Self {
        self.bulk_concurrency = concurrency.max(1);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Recompute the lead's score from scratch, overwrite the stored record
    /// and fire the score-tier actions.
    ///
    /// Concurrent calls for the same lead race on the upsert; the last write
    /// wins.
    #[instrument(skip(self))]
    pub async fn calculate_score(&self, lead_id: Uuid) -> Result<ScoreResult, ScoringError> {
        let inputs = self
            .leads
            .scoring_inputs(lead_id)
            .await?
            .ok_or(ScoringError::NotFound(lead_id))?;

        let average_price = self
            .leads
            .average_available_price()
            .await?
            .filter(|p| *p > 0.0)
            .unwrap_or(self.config.default_average_price);

        let now = Utc::now();
        let factors = compute_factors(&inputs, average_price, now, &self.config);
        let score = factors.total().clamp(0.0, 100.0);
        let grade = grade_for(score, &self.config.grades);

        let record = LeadScoreRecord {
            lead_id,
            score,
            factors,
            grade,
            last_calculated: now,
        };
        self.leads.upsert_score(&record).await?;
        info!("Lead {} scored {:.1} ({})", lead_id, score, grade);

        let routing = match &self.router {
            Some(router) => Some(router.route(&inputs.lead, score, grade).await),
            None => None,
        };

        Ok(ScoreResult { record, routing })
    }

    pub async fn get_score(&self, lead_id: Uuid) -> Result<LeadScoreRecord, ScoringError> {
        self.leads
            .get_score(lead_id)
            .await?
            .ok_or(ScoringError::NotFound(lead_id))
    }

    /// Rescore every scorable lead with bounded concurrency. Individual
    /// failures are counted, not raised.
    #[instrument(skip(self))]
    pub async fn bulk_calculate_scores(&self) -> Result<BulkScoreReport, ScoringError> {
        let lead_ids = self.leads.scorable_lead_ids().await?;
        info!("Recalculating scores for {} leads", lead_ids.len());

        let outcomes: Vec<(Uuid, Result<ScoreResult, ScoringError>)> = stream::iter(lead_ids)
            .map(|lead_id| async move { (lead_id, self.calculate_score(lead_id).await) })
            .buffer_unordered(self.bulk_concurrency)
            .collect()
            .await;

        let mut report = BulkScoreReport::default();
        for (lead_id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    report.succeeded += 1;
                    report.results.push(result);
                }
                Err(e) => {
                    match &e {
                        ScoringError::NotFound(_) => warn!("Lead {} vanished during recalculation", lead_id),
                        ScoringError::StoreUnavailable(_) => error!("Scoring lead {} failed: {}", lead_id, e),
                    }
                    report.failed += 1;
                    report.errors.push(BulkScoreFailure {
                        lead_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Score recalculation finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }
}
