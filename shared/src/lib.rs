use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>, // referral, website, walk_in, facebook, instagram, ...
    pub status: String,         // new, contacted, qualified, negotiating, won, lost
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Letter bucket derived from a lead score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Grade::A),
            "B" | "b" => Ok(Grade::B),
            "C" | "c" => Ok(Grade::C),
            "D" | "d" => Ok(Grade::D),
            "E" | "e" => Ok(Grade::E),
            other => Err(format!("unknown grade: {other}")),
        }
    }
}

/// Per-factor breakdown of a lead score. Serialises as a name -> value map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub budget: f64,
    pub timeline: f64,
    pub engagement: f64,
    pub source: f64,
    pub demographics: f64,
}

impl ScoreFactors {
    pub fn total(&self) -> f64 {
        self.budget + self.timeline + self.engagement + self.source + self.demographics
    }
}

/// One row per lead; overwritten on every recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreRecord {
    pub lead_id: Uuid,
    pub score: f64,
    pub factors: ScoreFactors,
    pub grade: Grade,
    pub last_calculated: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assigned_to: Option<Uuid>,
    pub priority: String, // low, medium, high, urgent
    pub status: String,   // open, completed
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub due_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub overdue_notified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: Option<Uuid>,
    pub priority: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub due_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String, // info, warning, error, success
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub is_standing: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub campaign_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Sales agent with the performance and workload figures used for lead routing.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStats {
    pub user_id: Uuid,
    pub name: String,
    pub sales_last_3_months: i64,
    pub avg_conversion_days: Option<f64>,
    pub open_leads: i64,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// Append-only audit entry, one per attempted workflow action.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionLog {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub action_snapshot: serde_json::Value,
    pub event_payload_snapshot: serde_json::Value,
    pub outcome: String, // success, failed
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}
