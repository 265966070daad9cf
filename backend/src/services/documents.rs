// Document Generation - Queues rendering jobs for the document worker

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::repositories::StoreError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Returns the storage path the document will be written to.
    async fn generate(&self, template_id: &str, entity_type: &str, entity_id: Uuid) -> Result<String, StoreError>;
}

/// Records a job in `document_jobs`; rendering happens out of process.
pub struct QueuedDocumentGenerator {
    pool: PgPool,
}

impl QueuedDocumentGenerator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub fn output_path(template_id: &str, entity_type: &str, entity_id: Uuid) -> String {
    format!("documents/{}/{}-{}.pdf", template_id, entity_type, entity_id)
}

#[async_trait]
impl DocumentGenerator for QueuedDocumentGenerator {
    async fn generate(&self, template_id: &str, entity_type: &str, entity_id: Uuid) -> Result<String, StoreError> {
        let template_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM document_templates WHERE id = $1)")
                .bind(template_id)
                .fetch_one(&self.pool)
                .await?;

        if !template_exists {
            return Err(StoreError::not_found("document template", template_id));
        }

        let path = output_path(template_id, entity_type, entity_id);

        sqlx::query(
            r#"
            INSERT INTO document_jobs (id, template_id, entity_type, entity_id, output_path, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'queued', NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(template_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(&path)
        .execute(&self.pool)
        .await?;

        info!("Queued document '{}' for {} {}", template_id, entity_type, entity_id);
        Ok(path)
    }
}
