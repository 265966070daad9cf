use async_trait::async_trait;
use uuid::Uuid;

use realty_shared::{Campaign, CampaignRecipient};

use super::{CampaignStore, PgRepository, StoreError};

#[async_trait]
impl CampaignStore for PgRepository {
    async fn add_recipient(
        &self,
        campaign_id: Uuid,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM campaigns WHERE id = $1)")
            .bind(campaign_id)
            .fetch_one(self.pool())
            .await?;

        if !exists {
            return Err(StoreError::not_found("campaign", campaign_id));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_recipients (campaign_id, entity_type, entity_id, added_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (campaign_id, entity_type, entity_id) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(entity_type)
        .bind(entity_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ensure_standing_campaign(&self, name: &str) -> Result<Campaign, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, is_standing, created_at)
            VALUES ($1, $2, true, NOW())
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(self.pool())
        .await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT id, name, is_standing, created_at FROM campaigns WHERE name = $1",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await?;

        Ok(campaign)
    }

    async fn recipients(&self, campaign_id: Uuid) -> Result<Vec<CampaignRecipient>, StoreError> {
        let rows = sqlx::query_as::<_, CampaignRecipient>(
            r#"
            SELECT r.campaign_id, r.entity_type, r.entity_id,
                   COALESCE(l.full_name, c.full_name) AS name,
                   COALESCE(l.email, c.email) AS email,
                   COALESCE(l.phone, c.phone) AS phone,
                   r.added_at
            FROM campaign_recipients r
            LEFT JOIN leads l ON r.entity_type = 'lead' AND l.id = r.entity_id
            LEFT JOIN clients c ON r.entity_type = 'client' AND c.id = r.entity_id
            WHERE r.campaign_id = $1
            ORDER BY r.added_at ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
