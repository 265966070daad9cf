// Repositories - Collaborator contracts for persistence, with Postgres implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use realty_shared::{
    AgentStats, Campaign, CampaignRecipient, LeadScoreRecord, NewNotification, NewTask,
    Notification, Task, WorkflowExecutionLog,
};

use crate::scoring::ScoringInputs;
use crate::workflows::{TriggerType, WorkflowRule, WorkflowRuleInput};

pub mod campaigns;
pub mod entities;
pub mod leads;
pub mod notifications;
pub mod tasks;
pub mod workflows;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::not_found("record", "?"),
            sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

/// Generic read/write access to CRM entities addressed by `entity_type`/`entity_id`
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_entity(&self, entity_type: &str, id: Uuid) -> Result<Value, StoreError>;

    async fn update_field(
        &self,
        entity_type: &str,
        id: Uuid,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    /// Open tasks past due that have not been flagged yet
    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError>;

    async fn mark_overdue_notified(&self, task_id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, StoreError>;
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Returns `false` when the recipient was already enrolled.
    async fn add_recipient(
        &self,
        campaign_id: Uuid,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Fetch a standing campaign by name, creating it on first use.
    async fn ensure_standing_campaign(&self, name: &str) -> Result<Campaign, StoreError>;

    async fn recipients(&self, campaign_id: Uuid) -> Result<Vec<CampaignRecipient>, StoreError>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Enabled rules registered for `trigger`, in insertion order
    async fn enabled_rules_for(&self, trigger: TriggerType) -> Result<Vec<WorkflowRule>, StoreError>;

    async fn record_execution(&self, log: &WorkflowExecutionLog) -> Result<(), StoreError>;

    async fn bump_execution_count(&self, rule_id: Uuid) -> Result<(), StoreError>;

    async fn list_rules(&self) -> Result<Vec<WorkflowRule>, StoreError>;

    async fn get_rule(&self, id: Uuid) -> Result<WorkflowRule, StoreError>;

    async fn create_rule(&self, input: WorkflowRuleInput) -> Result<WorkflowRule, StoreError>;

    async fn update_rule(&self, id: Uuid, input: WorkflowRuleInput) -> Result<WorkflowRule, StoreError>;

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<WorkflowRule, StoreError>;

    async fn delete_rule(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn scoring_inputs(&self, lead_id: Uuid) -> Result<Option<ScoringInputs>, StoreError>;

    /// Mean price of properties currently on the market
    async fn average_available_price(&self) -> Result<Option<f64>, StoreError>;

    /// Last write wins; concurrent recalculations of one lead are not serialised.
    async fn upsert_score(&self, record: &LeadScoreRecord) -> Result<(), StoreError>;

    async fn get_score(&self, lead_id: Uuid) -> Result<Option<LeadScoreRecord>, StoreError>;

    async fn scorable_lead_ids(&self) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn available_agents(&self) -> Result<Vec<AgentStats>, StoreError>;
}

/// Postgres-backed implementation of every store contract
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
