use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use realty_shared::WorkflowExecutionLog;

use super::{PgRepository, StoreError, WorkflowStore};
use crate::workflows::{TriggerType, WorkflowRule, WorkflowRuleInput};

const RULE_COLUMNS: &str =
    "id, name, trigger_event, conditions, actions, enabled, execution_count, created_at, updated_at";

#[derive(Debug, FromRow)]
struct WorkflowRow {
    id: Uuid,
    name: String,
    trigger_event: String,
    conditions: Value,
    actions: Value,
    enabled: bool,
    execution_count: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowRow> for WorkflowRule {
    type Error = String;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(WorkflowRule {
            id: row.id,
            name: row.name,
            trigger_event: row.trigger_event.parse()?,
            conditions: serde_json::from_value(row.conditions).map_err(|e| format!("conditions: {e}"))?,
            actions: serde_json::from_value(row.actions).map_err(|e| format!("actions: {e}"))?,
            enabled: row.enabled,
            execution_count: row.execution_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Rows that no longer deserialize are skipped rather than failing the batch.
fn decode_rules(rows: Vec<WorkflowRow>) -> Vec<WorkflowRule> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match WorkflowRule::try_from(row) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping malformed workflow {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn decode_rule(row: WorkflowRow) -> Result<WorkflowRule, StoreError> {
    let id = row.id;
    WorkflowRule::try_from(row).map_err(|e| StoreError::Conflict(format!("workflow {} is malformed: {}", id, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Conflict(e.to_string()))
}

#[async_trait]
impl WorkflowStore for PgRepository {
    async fn enabled_rules_for(&self, trigger: TriggerType) -> Result<Vec<WorkflowRule>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {} FROM workflows WHERE enabled = true AND trigger_event = $1 ORDER BY created_at ASC",
            RULE_COLUMNS
        ))
        .bind(trigger.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(decode_rules(rows))
    }

    async fn record_execution(&self, log: &WorkflowExecutionLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_execution_logs
                (id, workflow_id, action_snapshot, event_payload_snapshot, outcome, error, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.workflow_id)
        .bind(&log.action_snapshot)
        .bind(&log.event_payload_snapshot)
        .bind(&log.outcome)
        .bind(&log.error)
        .bind(log.executed_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn bump_execution_count(&self, rule_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE workflows SET execution_count = execution_count + 1 WHERE id = $1")
            .bind(rule_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn list_rules(&self) -> Result<Vec<WorkflowRule>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {} FROM workflows ORDER BY created_at ASC",
            RULE_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(decode_rules(rows))
    }

    async fn get_rule(&self, id: Uuid) -> Result<WorkflowRule, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!("SELECT {} FROM workflows WHERE id = $1", RULE_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::not_found("workflow", id))?;

        decode_rule(row)
    }

    async fn create_rule(&self, input: WorkflowRuleInput) -> Result<WorkflowRule, StoreError> {
        let rule = WorkflowRule::from_input(input);

        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            r#"
            INSERT INTO workflows (id, name, trigger_event, conditions, actions, enabled, execution_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(rule.trigger_event.as_str())
        .bind(to_json(&rule.conditions)?)
        .bind(to_json(&rule.actions)?)
        .bind(rule.enabled)
        .bind(rule.created_at)
        .fetch_one(self.pool())
        .await?;

        decode_rule(row)
    }

    async fn update_rule(&self, id: Uuid, input: WorkflowRuleInput) -> Result<WorkflowRule, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            r#"
            UPDATE workflows
            SET name = $2, trigger_event = $3, conditions = $4, actions = $5, enabled = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.trigger_event.as_str())
        .bind(to_json(&input.conditions)?)
        .bind(to_json(&input.actions)?)
        .bind(input.enabled)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found("workflow", id))?;

        decode_rule(row)
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<WorkflowRule, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "UPDATE workflows SET enabled = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            RULE_COLUMNS
        ))
        .bind(id)
        .bind(enabled)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| StoreError::not_found("workflow", id))?;

        decode_rule(row)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("workflow", id));
        }
        Ok(())
    }
}
