use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use realty_shared::{NewTask, Task};

use super::{PgRepository, StoreError, TaskStore};

const TASK_COLUMNS: &str = "id, title, description, assigned_to, priority, status, entity_type, entity_id, \
                            due_at, completed_at, overdue_notified, created_at";

#[async_trait]
impl TaskStore for PgRepository {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let row = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (id, title, description, assigned_to, priority, status,
                               entity_type, entity_id, due_at, overdue_notified, created_at)
            VALUES ($1, $2, $3, $4, $5, 'open', $6, $7, $8, false, NOW())
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assigned_to)
        .bind(&task.priority)
        .bind(&task.entity_type)
        .bind(task.entity_id)
        .bind(task.due_at)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE status <> 'completed'
              AND completed_at IS NULL
              AND overdue_notified = false
              AND due_at < $1
            ORDER BY due_at ASC
            "#,
            TASK_COLUMNS
        ))
        .bind(now)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    async fn mark_overdue_notified(&self, task_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tasks SET overdue_notified = true WHERE id = $1")
            .bind(task_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("task", task_id));
        }
        Ok(())
    }
}
