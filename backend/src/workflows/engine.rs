// Workflow Engine - Matches events to rules and runs their actions

use chrono::Utc;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use realty_shared::WorkflowExecutionLog;

use super::error::EngineError;
use super::{
    conditions, ActionDispatcher, ActionResult, EmittedEvent, EventPayload, TriggerEvent,
    TriggerType, WorkflowRule,
};
use crate::repositories::WorkflowStore;

/// Stages of a single dispatch. Nothing carries over between dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Idle,
    Matching,
    Evaluating,
    Dispatching,
    Logged,
}

/// Per-trigger outcome list returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub trigger: TriggerType,
    pub rules_considered: usize,
    pub rules_fired: Vec<Uuid>,
    pub actions: Vec<ActionResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub phase: DispatchPhase,
    /// Follow-up events reported by actions; only a cascade acts on them
    #[serde(skip)]
    pub emitted: Vec<EmittedEvent>,
}

impl TriggerOutcome {
    fn new(trigger: TriggerType) -> Self {
        Self {
            trigger,
            rules_considered: 0,
            rules_fired: Vec::new(),
            actions: Vec::new(),
            succeeded: 0,
            failed: 0,
            phase: DispatchPhase::Idle,
            emitted: Vec::new(),
        }
    }

    fn advance(&mut self, next: DispatchPhase) {
        debug!("{}: {:?} -> {:?}", self.trigger, self.phase, next);
        self.phase = next;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeOutcome {
    pub dispatches: Vec<TriggerOutcome>,
    /// Follow-up events discarded because the chain got too deep
    pub dropped_events: usize,
}

impl CascadeOutcome {
    pub fn succeeded(&self) -> usize {
        self.dispatches.iter().map(|d| d.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.dispatches.iter().map(|d| d.failed).sum()
    }
}

type FiredSet = HashSet<(Uuid, Option<Uuid>)>;

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    dispatcher: Arc<ActionDispatcher>,
    max_chain_depth: usize,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, dispatcher: Arc<ActionDispatcher>, max_chain_depth: usize) -> Self {
        Self {
            store,
            dispatcher,
            max_chain_depth,
        }
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    /// Run every enabled rule registered for `trigger` against `payload`.
    ///
    /// Rules run one after another and actions in declaration order. A
    /// failing action is logged and skipped; only an unreadable rule table
    /// is reported as an error. Events emitted by actions are returned in
    /// the outcome but never processed here.
    #[instrument(skip(self, payload), fields(trigger = %trigger))]
    pub async fn process_trigger(&self, trigger: TriggerType, payload: EventPayload) -> Result<TriggerOutcome, EngineError> {
        self.run(trigger, &payload, None).await
    }

    /// `process_trigger` for an event that carries its own source.
    pub async fn process_event(&self, event: TriggerEvent) -> Result<TriggerOutcome, EngineError> {
        info!("Processing event {} from {:?} ({})", event.trigger_type, event.source, event.event_id);
        self.process_trigger(event.trigger_type, event.payload).await
    }

    /// Process `trigger` and then, breadth first, every event its actions
    /// emit, each as a separate top-level dispatch.
    ///
    /// Follow-ups deeper than `max_chain_depth` are dropped, and a rule fires
    /// at most once per entity within one cascade.
    #[instrument(skip(self, payload), fields(trigger = %trigger))]
    pub async fn process_cascade(&self, trigger: TriggerType, payload: EventPayload) -> Result<CascadeOutcome, EngineError> {
        let mut queue = VecDeque::from([(trigger, payload, 0usize)]);
        let mut fired = FiredSet::new();
        let mut outcome = CascadeOutcome {
            dispatches: Vec::new(),
            dropped_events: 0,
        };

        while let Some((trigger, payload, depth)) = queue.pop_front() {
            let mut dispatch = self.run(trigger, &payload, Some(&mut fired)).await?;

            for event in dispatch.emitted.drain(..) {
                if depth + 1 > self.max_chain_depth {
                    warn!(
                        "Dropping {} emitted at depth {}: chain limit {} reached",
                        event.trigger_type, depth, self.max_chain_depth
                    );
                    outcome.dropped_events += 1;
                } else {
                    queue.push_back((event.trigger_type, event.payload, depth + 1));
                }
            }

            outcome.dispatches.push(dispatch);
        }

        Ok(outcome)
    }

    async fn run(
        &self,
        trigger: TriggerType,
        payload: &EventPayload,
        mut fired: Option<&mut FiredSet>,
    ) -> Result<TriggerOutcome, EngineError> {
        let mut outcome = TriggerOutcome::new(trigger);
        outcome.advance(DispatchPhase::Matching);

        let rules = self.store.enabled_rules_for(trigger).await.map_err(|e| {
            error!("Cannot load rules for {}: {}", trigger, e);
            EngineError::StoreUnavailable(e)
        })?;

        let entity_id = payload.entity_id();

        for rule in rules.iter().filter(|r| r.enabled && r.trigger_event == trigger) {
            outcome.rules_considered += 1;

            if let Some(fired) = fired.as_deref() {
                if fired.contains(&(rule.id, entity_id)) {
                    debug!("Rule '{}' already fired for this entity in the cascade", rule.name);
                    continue;
                }
            }

            outcome.advance(DispatchPhase::Evaluating);
            if !conditions::evaluate(&rule.conditions, payload) {
                debug!("Rule '{}' conditions not met", rule.name);
                continue;
            }

            if let Some(fired) = fired.as_deref_mut() {
                fired.insert((rule.id, entity_id));
            }

            outcome.advance(DispatchPhase::Dispatching);
            self.run_actions(rule, payload, &mut outcome).await;
            outcome.rules_fired.push(rule.id);

            if let Err(e) = self.store.bump_execution_count(rule.id).await {
                warn!("Failed to bump execution count for rule {}: {}", rule.id, e);
            }
            info!("Workflow '{}' fired on {}", rule.name, trigger);
        }

        outcome.advance(if outcome.rules_fired.is_empty() {
            DispatchPhase::Idle
        } else {
            DispatchPhase::Logged
        });

        info!(
            "{}: {} rules fired, {} actions succeeded, {} failed",
            trigger,
            outcome.rules_fired.len(),
            outcome.succeeded,
            outcome.failed
        );
        Ok(outcome)
    }

    async fn run_actions(&self, rule: &WorkflowRule, payload: &EventPayload, outcome: &mut TriggerOutcome) {
        for (index, action) in rule.actions.iter().enumerate() {
            let started = Instant::now();
            let result = self.dispatcher.execute(action, payload).await;
            let duration_ms = started.elapsed().as_millis() as i64;

            let (record, error) = match result {
                Ok(output) => {
                    if let Some(event) = output.emitted {
                        outcome.emitted.push(event);
                    }
                    outcome.succeeded += 1;
                    (
                        ActionResult::success(rule.id, index, action.action_type, output.output),
                        None,
                    )
                }
                Err(e) => {
                    warn!(
                        "Action {} #{} of rule '{}' failed: {}",
                        action.action_type, index, rule.name, e
                    );
                    outcome.failed += 1;
                    (
                        ActionResult::failure(rule.id, index, action.action_type, &e),
                        Some(e.to_string()),
                    )
                }
            };

            let log = WorkflowExecutionLog {
                id: Uuid::new_v4(),
                workflow_id: rule.id,
                action_snapshot: serde_json::to_value(action).unwrap_or_default(),
                event_payload_snapshot: payload.as_value().clone(),
                outcome: if error.is_none() { "success" } else { "failed" }.to_string(),
                error,
                executed_at: Utc::now(),
            };
            if let Err(e) = self.store.record_execution(&log).await {
                warn!("Failed to write execution log for rule {}: {}", rule.id, e);
            }

            outcome.actions.push(record.with_duration(duration_ms));
        }
    }
}
