use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use realty_shared::{AgentStats, Lead, LeadScoreRecord, ScoreFactors};

use super::{AgentDirectory, LeadStore, PgRepository, StoreError};
use crate::scoring::ScoringInputs;

#[derive(Debug, FromRow)]
struct ScoringRow {
    #[sqlx(flatten)]
    lead: Lead,
    email_opens: i64,
    clicks: i64,
    completed_site_visits: i64,
    last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    lead_id: Uuid,
    score: f64,
    factors: Json<ScoreFactors>,
    grade: String,
    last_calculated: DateTime<Utc>,
}

impl TryFrom<ScoreRow> for LeadScoreRecord {
    type Error = StoreError;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        let grade = row
            .grade
            .parse()
            .map_err(|e: String| StoreError::Conflict(format!("score for lead {}: {}", row.lead_id, e)))?;

        Ok(LeadScoreRecord {
            lead_id: row.lead_id,
            score: row.score,
            factors: row.factors.0,
            grade,
            last_calculated: row.last_calculated,
        })
    }
}

#[async_trait]
impl LeadStore for PgRepository {
    async fn scoring_inputs(&self, lead_id: Uuid) -> Result<Option<ScoringInputs>, StoreError> {
        let row = sqlx::query_as::<_, ScoringRow>(
            r#"
            SELECT l.id, l.full_name, l.email, l.phone, l.source, l.status, l.notes,
                   l.assigned_to, l.created_at, l.updated_at,
                   (SELECT COUNT(*) FROM lead_activities a
                     WHERE a.lead_id = l.id AND a.activity_type = 'email_open') AS email_opens,
                   (SELECT COUNT(*) FROM lead_activities a
                     WHERE a.lead_id = l.id AND a.activity_type = 'click') AS clicks,
                   (SELECT COUNT(*) FROM site_visits v
                     WHERE v.lead_id = l.id AND v.status = 'completed') AS completed_site_visits,
                   (SELECT MAX(a.occurred_at) FROM lead_activities a
                     WHERE a.lead_id = l.id) AS last_activity_at
            FROM leads l
            WHERE l.id = $1
            "#,
        )
        .bind(lead_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| ScoringInputs {
            lead: r.lead,
            email_opens: r.email_opens,
            clicks: r.clicks,
            completed_site_visits: r.completed_site_visits,
            last_activity_at: r.last_activity_at,
        }))
    }

    async fn average_available_price(&self) -> Result<Option<f64>, StoreError> {
        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(price)::float8 FROM properties WHERE status = 'available'")
                .fetch_one(self.pool())
                .await?;
        Ok(avg)
    }

    async fn upsert_score(&self, record: &LeadScoreRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lead_scores (lead_id, score, factors, grade, last_calculated)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (lead_id) DO UPDATE
            SET score = EXCLUDED.score,
                factors = EXCLUDED.factors,
                grade = EXCLUDED.grade,
                last_calculated = EXCLUDED.last_calculated
            "#,
        )
        .bind(record.lead_id)
        .bind(record.score)
        .bind(Json(record.factors))
        .bind(record.grade.as_str())
        .bind(record.last_calculated)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn get_score(&self, lead_id: Uuid) -> Result<Option<LeadScoreRecord>, StoreError> {
        let row = sqlx::query_as::<_, ScoreRow>(
            "SELECT lead_id, score, factors, grade, last_calculated FROM lead_scores WHERE lead_id = $1",
        )
        .bind(lead_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(LeadScoreRecord::try_from).transpose()
    }

    async fn scorable_lead_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM leads WHERE status NOT IN ('won', 'lost') ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl AgentDirectory for PgRepository {
    async fn available_agents(&self) -> Result<Vec<AgentStats>, StoreError> {
        let agents = sqlx::query_as::<_, AgentStats>(
            r#"
            SELECT u.id AS user_id, u.name,
                   (SELECT COUNT(*) FROM sales s
                     WHERE s.agent_id = u.id
                       AND s.created_at >= NOW() - INTERVAL '3 months') AS sales_last_3_months,
                   (SELECT AVG(EXTRACT(EPOCH FROM (s.closed_at - l.created_at)) / 86400.0)::float8
                      FROM sales s JOIN leads l ON l.id = s.lead_id
                     WHERE s.agent_id = u.id AND s.closed_at IS NOT NULL) AS avg_conversion_days,
                   (SELECT COUNT(*) FROM leads l
                     WHERE l.assigned_to = u.id AND l.status NOT IN ('won', 'lost')) AS open_leads,
                   (SELECT MAX(l.assigned_at) FROM leads l
                     WHERE l.assigned_to = u.id) AS last_assigned_at
            FROM users u
            WHERE u.role = 'agent' AND u.is_active = true
            ORDER BY u.name ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(agents)
    }
}
