// Workflow Actions - Side effects a rule can request

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::{EventPayload, TriggerType};

/// Types of actions that workflows can execute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // Ownership and status
    AssignToUser,
    UpdateStatus,

    // Messaging
    SendEmail,
    SendSms,
    SendWhatsapp,

    // Records
    CreateTask,
    CreateNotification,
    AddToCampaign,
    GenerateDocument,

    // Integration
    Webhook,
}

impl ActionType {
    pub const ALL: [ActionType; 10] = [
        ActionType::AssignToUser,
        ActionType::UpdateStatus,
        ActionType::SendEmail,
        ActionType::SendSms,
        ActionType::SendWhatsapp,
        ActionType::CreateTask,
        ActionType::CreateNotification,
        ActionType::AddToCampaign,
        ActionType::GenerateDocument,
        ActionType::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::AssignToUser => "assign_to_user",
            ActionType::UpdateStatus => "update_status",
            ActionType::SendEmail => "send_email",
            ActionType::SendSms => "send_sms",
            ActionType::SendWhatsapp => "send_whatsapp",
            ActionType::CreateTask => "create_task",
            ActionType::CreateNotification => "create_notification",
            ActionType::AddToCampaign => "add_to_campaign",
            ActionType::GenerateDocument => "generate_document",
            ActionType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action descriptor stored on a workflow rule.
///
/// String values inside `config` may carry `{{path}}` templates; they are
/// rendered against the event payload right before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Follow-up event reported by an action. The engine only acts on it inside
/// a cascade; a plain dispatch ignores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub trigger_type: TriggerType,
    pub payload: EventPayload,
}

/// What a successful dispatch produced
#[derive(Debug, Clone, Default)]
pub struct ActionOutput {
    pub output: Option<Value>,
    pub emitted: Option<EmittedEvent>,
}

impl ActionOutput {
    pub fn new(output: Value) -> Self {
        Self {
            output: Some(output),
            emitted: None,
        }
    }

    pub fn with_event(mut self, trigger_type: TriggerType, payload: EventPayload) -> Self {
        self.emitted = Some(EmittedEvent { trigger_type, payload });
        self
    }
}

/// Recorded outcome of one action attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub rule_id: Uuid,
    pub action_index: usize,
    pub action_type: ActionType,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub duration_ms: i64,
}

impl ActionSpec {
    pub fn new(action_type: ActionType, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { action_type, config }
    }

    pub fn with_config(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    // ===== Builders =====

    pub fn assign_to_user(user_id: Uuid) -> Self {
        Self::new(
            ActionType::AssignToUser,
            serde_json::json!({ "user_id": user_id }),
        )
    }

    pub fn update_status(status: &str) -> Self {
        Self::new(
            ActionType::UpdateStatus,
            serde_json::json!({ "status": status }),
        )
    }

    pub fn send_email(recipient: &str, subject: &str, body: &str) -> Self {
        Self::new(
            ActionType::SendEmail,
            serde_json::json!({
                "recipient": recipient,
                "subject": subject,
                "body": body
            }),
        )
    }

    pub fn send_sms(recipient: &str, message: &str) -> Self {
        Self::new(
            ActionType::SendSms,
            serde_json::json!({
                "recipient": recipient,
                "message": message
            }),
        )
    }

    pub fn send_whatsapp(recipient: &str, message: &str) -> Self {
        Self::new(
            ActionType::SendWhatsapp,
            serde_json::json!({
                "recipient": recipient,
                "message": message
            }),
        )
    }

    pub fn create_task(title: &str, description: &str, priority: &str, due_in_days: i64) -> Self {
        Self::new(
            ActionType::CreateTask,
            serde_json::json!({
                "title": title,
                "description": description,
                "priority": priority,
                "due_in_days": due_in_days
            }),
        )
    }

    pub fn create_notification(title: &str, message: &str, notification_type: &str) -> Self {
        Self::new(
            ActionType::CreateNotification,
            serde_json::json!({
                "title": title,
                "message": message,
                "type": notification_type
            }),
        )
    }

    pub fn add_to_campaign(campaign_id: Uuid) -> Self {
        Self::new(
            ActionType::AddToCampaign,
            serde_json::json!({ "campaign_id": campaign_id }),
        )
    }

    pub fn generate_document(template_id: &str) -> Self {
        Self::new(
            ActionType::GenerateDocument,
            serde_json::json!({ "template_id": template_id }),
        )
    }

    pub fn webhook(url: &str, payload: Value) -> Self {
        Self::new(
            ActionType::Webhook,
            serde_json::json!({
                "url": url,
                "method": "POST",
                "payload": payload
            }),
        )
    }
}

impl ActionResult {
    pub fn success(rule_id: Uuid, action_index: usize, action_type: ActionType, output: Option<Value>) -> Self {
        Self {
            rule_id,
            action_index,
            action_type,
            success: true,
            output,
            error: None,
            error_kind: None,
            duration_ms: 0,
        }
    }

    pub fn failure(
        rule_id: Uuid,
        action_index: usize,
        action_type: ActionType,
        error: &super::ActionError,
    ) -> Self {
        Self {
            rule_id,
            action_index,
            action_type,
            success: false,
            output: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Pre-built action sequences for common real-estate workflows
pub mod presets {
    use super::*;

    /// Greets a new lead over email and WhatsApp and books a first call
    pub fn welcome_sequence() -> Vec<ActionSpec> {
        vec![
            ActionSpec::send_email(
                "{{lead.email}}",
                "Welcome, {{lead.full_name}}",
                "Hi {{lead.full_name}}, thanks for your interest. One of our agents will reach out shortly.",
            ),
            ActionSpec::send_whatsapp(
                "{{lead.phone}}",
                "Hi {{lead.full_name}}, thanks for reaching out! Reply here any time with questions.",
            ),
            ActionSpec::create_task("Intro call with {{lead.full_name}}", "First contact call", "high", 1),
        ]
    }

    /// Alerts the owning agent about a lead that turned hot
    pub fn hot_lead_alert() -> Vec<ActionSpec> {
        vec![
            ActionSpec::create_notification(
                "Hot lead",
                "{{lead.full_name}} is now {{new_status}}",
                "success",
            ),
            ActionSpec::create_task("Call {{lead.full_name}} today", "Lead marked hot", "urgent", 0)
                .with_config("due_in_hours", serde_json::json!(2)),
        ]
    }

    /// Confirms a received payment to the client and files a receipt
    pub fn payment_receipt() -> Vec<ActionSpec> {
        vec![
            ActionSpec::send_email(
                "{{client.email}}",
                "Payment received",
                "We received your payment of {{payment.amount}} (ref {{payment.reference}}).",
            ),
            ActionSpec::generate_document("payment_receipt"),
        ]
    }

    /// Drops a lead into a drip campaign
    pub fn nurture_enrollment(campaign_id: Uuid) -> Vec<ActionSpec> {
        vec![ActionSpec::add_to_campaign(campaign_id)]
    }
}
