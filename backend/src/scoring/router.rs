// Score-Tier Router - Grade-driven assignment, follow-up and nurture enrollment

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use realty_shared::{AgentStats, Grade, Lead};

use super::config::RoutingConfig;
use crate::repositories::{AgentDirectory, CampaignStore};
use crate::workflows::{ActionDispatcher, ActionSpec, ActionType, EventPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    BestAgent,
    RoundRobin,
    Nurture,
    NoAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutedAction {
    pub action_type: ActionType,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingOutcome {
    pub decision: RoutingDecision,
    /// Owner after routing; `None` when no agent was eligible
    pub owner: Option<Uuid>,
    pub newly_assigned: bool,
    pub actions: Vec<RoutedAction>,
}

impl RoutingOutcome {
    fn new(decision: RoutingDecision) -> Self {
        Self {
            decision,
            owner: None,
            newly_assigned: false,
            actions: Vec::new(),
        }
    }
}

/// Highest trailing sales among agents under the open-lead cap; ties go to
/// the faster average conversion, agents without one rank last.
pub fn select_best_agent(agents: &[AgentStats], max_open_leads: i64) -> Option<&AgentStats> {
    agents
        .iter()
        .filter(|a| a.open_leads < max_open_leads)
        .min_by(|a, b| {
            b.sales_last_3_months
                .cmp(&a.sales_last_3_months)
                .then_with(|| compare_conversion(a.avg_conversion_days, b.avg_conversion_days))
        })
}

/// Fewest open leads; ties go to whoever was assigned longest ago, with
/// never-assigned agents first.
pub fn select_round_robin(agents: &[AgentStats]) -> Option<&AgentStats> {
    agents.iter().min_by(|a, b| {
        a.open_leads
            .cmp(&b.open_leads)
            .then_with(|| a.last_assigned_at.cmp(&b.last_assigned_at))
    })
}

fn compare_conversion(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct ScoreTierRouter {
    dispatcher: Arc<ActionDispatcher>,
    agents: Arc<dyn AgentDirectory>,
    campaigns: Arc<dyn CampaignStore>,
    config: RoutingConfig,
}

impl ScoreTierRouter {
    pub fn new(
        dispatcher: Arc<ActionDispatcher>,
        agents: Arc<dyn AgentDirectory>,
        campaigns: Arc<dyn CampaignStore>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            dispatcher,
            agents,
            campaigns,
            config,
        }
    }

    /// Apply the grade's side effects. Failures are recorded on the outcome,
    /// never returned: the score itself is already persisted.
    pub async fn route(&self, lead: &Lead, score: f64, grade: Grade) -> RoutingOutcome {
        let payload = EventPayload::new(
            "lead",
            lead.id,
            serde_json::json!({
                "lead": lead,
                "score": score,
                "grade": grade
            }),
        );

        let outcome = match grade {
            Grade::A => self.assign_and_follow_up(lead, &payload, RoutingDecision::BestAgent).await,
            Grade::B => self.assign_and_follow_up(lead, &payload, RoutingDecision::RoundRobin).await,
            Grade::C | Grade::D => self.enroll_in_nurture(&payload).await,
            Grade::E => RoutingOutcome::new(RoutingDecision::NoAction),
        };

        info!(
            "Lead {} graded {} -> {:?} (owner {:?})",
            lead.id, grade, outcome.decision, outcome.owner
        );
        outcome
    }

    async fn assign_and_follow_up(&self, lead: &Lead, payload: &EventPayload, decision: RoutingDecision) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::new(decision);

        let owner = match lead.assigned_to {
            Some(existing) => Some(existing),
            None => {
                let picked = self.pick_agent(decision).await;
                if let Some(agent) = picked {
                    let assigned = self.run(ActionSpec::assign_to_user(agent), payload, &mut outcome).await;
                    outcome.newly_assigned = assigned;
                    assigned.then_some(agent)
                } else {
                    info!("No eligible agent for lead {}, leaving unassigned", lead.id);
                    None
                }
            }
        };
        outcome.owner = owner;

        let owner_value = owner.map_or(Value::String(String::new()), |id| Value::String(id.to_string()));

        let (hours, priority, title) = if decision == RoutingDecision::BestAgent {
            (self.config.grade_a_follow_up_hours, "urgent", "Urgent follow-up: {{lead.full_name}}")
        } else {
            (self.config.grade_b_follow_up_hours, "high", "Follow up with {{lead.full_name}}")
        };

        if decision == RoutingDecision::BestAgent && owner.is_some() {
            let notify = ActionSpec::create_notification(
                "Hot lead assigned",
                "{{lead.full_name}} scored {{score}} (grade {{grade}}). Follow up within the hour.",
                "success",
            )
            .with_config("user_id", owner_value.clone());
            self.run(notify, payload, &mut outcome).await;
        }

        let task = ActionSpec::create_task(title, "Lead scored grade {{grade}} ({{score}})", priority, 0)
            .with_config("due_in_hours", serde_json::json!(hours))
            .with_config("assigned_to", owner_value);
        self.run(task, payload, &mut outcome).await;

        outcome
    }

    async fn enroll_in_nurture(&self, payload: &EventPayload) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::new(RoutingDecision::Nurture);

        match self
            .campaigns
            .ensure_standing_campaign(&self.config.nurture_campaign)
            .await
        {
            Ok(campaign) => {
                self.run(ActionSpec::add_to_campaign(campaign.id), payload, &mut outcome)
                    .await;
            }
            Err(e) => {
                warn!("Nurture campaign '{}' unavailable: {}", self.config.nurture_campaign, e);
                outcome.actions.push(RoutedAction {
                    action_type: ActionType::AddToCampaign,
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                });
            }
        }

        outcome
    }

    async fn pick_agent(&self, decision: RoutingDecision) -> Option<Uuid> {
        let agents = match self.agents.available_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!("Agent directory unavailable, skipping assignment: {}", e);
                return None;
            }
        };

        let picked = match decision {
            RoutingDecision::BestAgent => select_best_agent(&agents, self.config.max_open_leads),
            _ => select_round_robin(&agents),
        };
        picked.map(|a| a.user_id)
    }

    async fn run(&self, action: ActionSpec, payload: &EventPayload, outcome: &mut RoutingOutcome) -> bool {
        let action_type = action.action_type;
        let routed = match self.dispatcher.execute(&action, payload).await {
            Ok(output) => RoutedAction {
                action_type,
                success: true,
                output: output.output,
                error: None,
            },
            Err(e) => {
                warn!("Score routing {} failed: {}", action_type, e);
                RoutedAction {
                    action_type,
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        };
        let success = routed.success;
        outcome.actions.push(routed);
        success
    }
}
