// Workflow Rules - Stored trigger/condition/action definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ActionSpec, Condition, TriggerType};

/// A rule: when `trigger_event` fires and every condition holds, run
/// `actions` in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRule {
    pub id: Uuid,
    pub name: String,
    pub trigger_event: TriggerType,
    pub conditions: Vec<Condition>,
    pub actions: Vec<ActionSpec>,
    pub enabled: bool,
    pub execution_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for creating or replacing a rule
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkflowRuleInput {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    pub trigger_event: TriggerType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[validate(length(min = 1, message = "at least one action is required"))]
    pub actions: Vec<ActionSpec>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowRule {
    pub fn from_input(input: WorkflowRuleInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            trigger_event: input.trigger_event,
            conditions: input.conditions,
            actions: input.actions,
            enabled: input.enabled,
            execution_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

impl WorkflowRuleInput {
    pub fn new(name: &str, trigger_event: TriggerType) -> Self {
        Self {
            name: name.to_string(),
            trigger_event,
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ready-made rules for a fresh installation
pub mod presets {
    use super::*;
    use crate::workflows::{actions, conditions};

    pub fn welcome_new_leads() -> WorkflowRuleInput {
        WorkflowRuleInput::new("Welcome new leads", TriggerType::LeadCreated)
            .with_actions(actions::presets::welcome_sequence())
    }

    pub fn referral_fast_track() -> WorkflowRuleInput {
        WorkflowRuleInput::new("Referral fast track", TriggerType::LeadCreated)
            .with_condition(conditions::presets::referral_lead())
            .with_action(
                ActionSpec::create_task("Call referral {{lead.full_name}}", "Referral lead", "urgent", 0)
                    .with_config("due_in_hours", serde_json::json!(1)),
            )
    }

    pub fn hot_lead_follow_up() -> WorkflowRuleInput {
        WorkflowRuleInput::new("Hot lead follow up", TriggerType::LeadStatusChanged)
            .with_condition(conditions::presets::status_changed_to("negotiating"))
            .with_actions(actions::presets::hot_lead_alert())
    }

    pub fn payment_receipt() -> WorkflowRuleInput {
        WorkflowRuleInput::new("Payment receipt", TriggerType::PaymentReceived)
            .with_actions(actions::presets::payment_receipt())
    }

    pub fn overdue_task_reminder() -> WorkflowRuleInput {
        WorkflowRuleInput::new("Overdue task reminder", TriggerType::TaskOverdue).with_action(
            ActionSpec::create_notification(
                "Task overdue",
                "'{{task.title}}' was due {{task.due_at}}",
                "warning",
            ),
        )
    }

    pub fn all() -> Vec<WorkflowRuleInput> {
        vec![
            welcome_new_leads(),
            referral_fast_track(),
            hot_lead_follow_up(),
            payment_receipt(),
            overdue_task_reminder(),
        ]
    }
}
