use async_trait::async_trait;
use uuid::Uuid;

use realty_shared::{NewNotification, Notification};

use super::{NotificationStore, PgRepository, StoreError};

#[async_trait]
impl NotificationStore for PgRepository {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, title, message, notification_type,
                                       entity_type, entity_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            RETURNING id, user_id, title, message, notification_type, entity_type, entity_id,
                      is_read AS read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(&notification.entity_type)
        .bind(notification.entity_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }
}
