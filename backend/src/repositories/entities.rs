//! Generic entity access for workflow actions.
//!
//! Table and column names cannot be bound as parameters, so both are taken
//! from fixed whitelists before any SQL is built.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{EntityStore, PgRepository, StoreError};

/// Entity type -> table
pub fn table_for(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "lead" => Some("leads"),
        "sale" => Some("sales"),
        "client" => Some("clients"),
        "task" => Some("tasks"),
        "site_visit" => Some("site_visits"),
        "document" => Some("documents"),
        "support_ticket" => Some("support_tickets"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    AssignedTo,
    Status,
}

fn column_for(field: &str) -> Option<Column> {
    match field {
        "assigned_to" => Some(Column::AssignedTo),
        "status" => Some(Column::Status),
        _ => None,
    }
}

#[async_trait]
impl EntityStore for PgRepository {
    async fn get_entity(&self, entity_type: &str, id: Uuid) -> Result<Value, StoreError> {
        let table = table_for(entity_type).ok_or_else(|| StoreError::not_found("entity type", entity_type))?;

        let row: Option<Value> = sqlx::query_scalar(&format!("SELECT to_jsonb(t) FROM {} t WHERE t.id = $1", table))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.ok_or_else(|| StoreError::not_found(entity_type, id))
    }

    async fn update_field(
        &self,
        entity_type: &str,
        id: Uuid,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let table = table_for(entity_type).ok_or_else(|| StoreError::not_found("entity type", entity_type))?;
        let column = column_for(field)
            .ok_or_else(|| StoreError::Conflict(format!("field '{}' is not updatable", field)))?;

        let result = match column {
            Column::AssignedTo => {
                let user_id: Option<Uuid> = match &value {
                    Value::Null => None,
                    Value::String(s) => Some(s.parse().map_err(|_| {
                        StoreError::Conflict(format!("'{}' is not a user id", s))
                    })?),
                    other => return Err(StoreError::Conflict(format!("'{}' is not a user id", other))),
                };
                // Leads also track when they were handed over, for round-robin.
                let extra = if table == "leads" { ", assigned_at = NOW()" } else { "" };
                sqlx::query(&format!(
                    "UPDATE {} SET assigned_to = $2, updated_at = NOW(){} WHERE id = $1",
                    table, extra
                ))
                .bind(id)
                .bind(user_id)
                .execute(self.pool())
                .await?
            }
            Column::Status => {
                let status = value
                    .as_str()
                    .ok_or_else(|| StoreError::Conflict(format!("'{}' is not a status", value)))?;
                sqlx::query(&format!("UPDATE {} SET status = $2, updated_at = NOW() WHERE id = $1", table))
                    .bind(id)
                    .bind(status)
                    .execute(self.pool())
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(entity_type, id));
        }
        Ok(())
    }
}
