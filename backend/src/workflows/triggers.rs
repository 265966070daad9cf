// Workflow Triggers - Domain events that can activate workflow rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::EventPayload;

/// Domain events a workflow rule can be registered for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    LeadCreated,
    LeadStatusChanged,
    SaleCreated,
    PaymentReceived,
    ClientCreated,
    TaskOverdue,
    SiteVisitScheduled,
    DocumentUploaded,
    SupportTicketCreated,
}

impl TriggerType {
    pub const ALL: [TriggerType; 9] = [
        TriggerType::LeadCreated,
        TriggerType::LeadStatusChanged,
        TriggerType::SaleCreated,
        TriggerType::PaymentReceived,
        TriggerType::ClientCreated,
        TriggerType::TaskOverdue,
        TriggerType::SiteVisitScheduled,
        TriggerType::DocumentUploaded,
        TriggerType::SupportTicketCreated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::LeadCreated => "lead_created",
            TriggerType::LeadStatusChanged => "lead_status_changed",
            TriggerType::SaleCreated => "sale_created",
            TriggerType::PaymentReceived => "payment_received",
            TriggerType::ClientCreated => "client_created",
            TriggerType::TaskOverdue => "task_overdue",
            TriggerType::SiteVisitScheduled => "site_visit_scheduled",
            TriggerType::DocumentUploaded => "document_uploaded",
            TriggerType::SupportTicketCreated => "support_ticket_created",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("unknown trigger event: {}", s))
    }
}

/// Who raised the event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EventSource {
    System,
    /// Posted to the dispatch endpoint by an entity controller
    Api,
    Scheduler,
}

/// A trigger event that can initiate workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: Uuid,
    pub trigger_type: TriggerType,
    pub payload: EventPayload,
    pub source: EventSource,
    pub timestamp: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(trigger_type: TriggerType, payload: EventPayload, source: EventSource) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            trigger_type,
            payload,
            source,
            timestamp: Utc::now(),
        }
    }

    /// The paying client is carried under `client` so receipts can address
    /// `{{client.email}}`.
    pub fn payment_received(
        sale_id: Uuid,
        client_id: Uuid,
        client_email: &str,
        amount: Decimal,
        reference: &str,
    ) -> Self {
        Self::new(
            TriggerType::PaymentReceived,
            EventPayload::new(
                "sale",
                sale_id,
                serde_json::json!({
                    "payment": {
                        "amount": amount.to_string(),
                        "reference": reference
                    },
                    "client": {
                        "id": client_id,
                        "email": client_email
                    }
                }),
            ),
            EventSource::System,
        )
    }

    pub fn task_overdue(task: &realty_shared::Task) -> Self {
        Self::new(
            TriggerType::TaskOverdue,
            EventPayload::new(
                "task",
                task.id,
                serde_json::json!({
                    "task": task,
                    "user_id": task.assigned_to
                }),
            ),
            EventSource::Scheduler,
        )
    }
}
