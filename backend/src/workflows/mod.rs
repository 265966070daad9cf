// Workflow Engine Module
// Event-driven rule evaluation and action dispatch for CRM automation

pub mod actions;
pub mod conditions;
pub mod engine;
pub mod error;
pub mod executor;
pub mod payload;
pub mod rule;
pub mod template;
pub mod triggers;

pub use actions::{ActionOutput, ActionResult, ActionSpec, ActionType, EmittedEvent};
pub use conditions::{Condition, ConditionOperator};
pub use engine::{CascadeOutcome, DispatchPhase, TriggerOutcome, WorkflowEngine};
pub use error::{ActionError, EngineError, EvaluationError};
pub use executor::{ActionDispatcher, Collaborators};
pub use payload::EventPayload;
pub use rule::{WorkflowRule, WorkflowRuleInput};
pub use triggers::{EventSource, TriggerEvent, TriggerType};
