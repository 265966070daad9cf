// Workflow Conditions - Field predicates gating rule execution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::EvaluationError;
use super::payload::scalar_to_string;
use super::EventPayload;

/// A single field/operator/value predicate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Dot path into the event payload, e.g. `lead.status`
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::In => "in",
        }
    }
}

impl Condition {
    pub fn new(field: &str, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }

    pub fn equals(field: &str, value: Value) -> Self {
        Self::new(field, ConditionOperator::Equals, value)
    }

    pub fn not_equals(field: &str, value: Value) -> Self {
        Self::new(field, ConditionOperator::NotEquals, value)
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Self::new(field, ConditionOperator::Contains, Value::String(value.to_string()))
    }

    pub fn greater_than(field: &str, value: f64) -> Self {
        Self::new(field, ConditionOperator::GreaterThan, serde_json::json!(value))
    }

    pub fn less_than(field: &str, value: f64) -> Self {
        Self::new(field, ConditionOperator::LessThan, serde_json::json!(value))
    }

    pub fn in_list(field: &str, values: Vec<Value>) -> Self {
        Self::new(field, ConditionOperator::In, Value::Array(values))
    }

    /// Evaluate this predicate against the payload.
    ///
    /// A missing (or null) field fails every operator, including `equals`
    /// against null. Only `not_equals` against a non-null value passes.
    pub fn evaluate(&self, payload: &EventPayload) -> Result<bool, EvaluationError> {
        let actual = payload.resolve(&self.field);

        match self.operator {
            ConditionOperator::Equals => {
                let Some(actual) = actual else { return Ok(false) };
                Ok(loose_equals(Some(actual), &self.value))
            }
            ConditionOperator::NotEquals => Ok(!loose_equals(actual, &self.value)),
            ConditionOperator::Contains => {
                let Some(actual) = actual else { return Ok(false) };
                match (scalar_to_string(actual), scalar_to_string(&self.value)) {
                    (Some(haystack), Some(needle)) => Ok(haystack.contains(&needle)),
                    _ => Err(self.uncomparable(actual)),
                }
            }
            ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
                let Some(actual) = actual else { return Ok(false) };
                match (as_number(actual), as_number(&self.value)) {
                    (Some(left), Some(right)) => Ok(if self.operator == ConditionOperator::GreaterThan {
                        left > right
                    } else {
                        left < right
                    }),
                    _ => Err(self.uncomparable(actual)),
                }
            }
            ConditionOperator::In => {
                let Some(actual) = actual else { return Ok(false) };
                match &self.value {
                    Value::Array(options) => Ok(options.iter().any(|o| loose_equals(Some(actual), o))),
                    Value::String(list) => Ok(list
                        .split(',')
                        .map(|item| Value::String(item.trim().to_string()))
                        .any(|o| loose_equals(Some(actual), &o))),
                    _ => Err(self.uncomparable(actual)),
                }
            }
        }
    }

    fn uncomparable(&self, actual: &Value) -> EvaluationError {
        EvaluationError::Uncomparable {
            operator: self.operator.as_str(),
            left: actual.to_string(),
            right: self.value.to_string(),
        }
    }
}

/// AND over all conditions, stopping at the first one that does not hold.
/// An empty list always passes.
pub fn evaluate(conditions: &[Condition], payload: &EventPayload) -> bool {
    for condition in conditions {
        match condition.evaluate(payload) {
            Ok(true) => continue,
            Ok(false) => return false,
            Err(e) => {
                debug!("Condition on '{}' treated as false: {}", condition.field, e);
                return false;
            }
        }
    }
    true
}

/// Loose equality with one explicit coercion rule:
/// numeric operands (numbers or numeric strings) compare as numbers,
/// booleans accept "true"/"false" and 1/0, null equals only null,
/// containers compare structurally and everything else compares as text.
/// An empty string is never numeric, so `"" != "0"`.
pub fn loose_equals(actual: Option<&Value>, expected: &Value) -> bool {
    let actual = match actual {
        None => return expected.is_null(),
        Some(v) if v.is_null() => return expected.is_null(),
        Some(v) => v,
    };
    if expected.is_null() {
        return false;
    }

    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }

    if actual.is_boolean() || expected.is_boolean() {
        return match (as_bool(actual), as_bool(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }

    match (actual, expected) {
        (Value::Array(_), _) | (Value::Object(_), _) | (_, Value::Array(_)) | (_, Value::Object(_)) => {
            actual == expected
        }
        _ => scalar_to_string(actual) == scalar_to_string(expected),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(true),
            Some(x) if x == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Common condition presets for real-estate workflows
pub mod presets {
    use super::*;

    pub fn lead_status(status: &str) -> Condition {
        Condition::equals("lead.status", serde_json::json!(status))
    }

    pub fn referral_lead() -> Condition {
        Condition::equals("lead.source", serde_json::json!("referral"))
    }

    pub fn social_lead() -> Condition {
        Condition::in_list(
            "lead.source",
            vec![serde_json::json!("facebook"), serde_json::json!("instagram")],
        )
    }

    pub fn payment_above(amount: f64) -> Condition {
        Condition::greater_than("payment.amount", amount)
    }

    pub fn status_changed_to(status: &str) -> Condition {
        Condition::equals("new_status", serde_json::json!(status))
    }

    pub fn notes_mention(keyword: &str) -> Condition {
        Condition::contains("lead.notes", keyword)
    }
}
