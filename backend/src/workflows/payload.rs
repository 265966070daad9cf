// Event Payload - Read-only event data addressed by dot paths

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Data attached to a trigger event.
///
/// The root is always a JSON object carrying `entity_type` and `entity_id`
/// next to arbitrary event-specific fields (`lead`, `user_id`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(Value);

impl EventPayload {
    /// Build a payload for an entity. Object fields are merged into the root;
    /// any other value is kept under `data`.
    pub fn new(entity_type: &str, entity_id: Uuid, fields: Value) -> Self {
        let mut root = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        root.insert("entity_type".to_string(), Value::String(entity_type.to_string()));
        root.insert("entity_id".to_string(), Value::String(entity_id.to_string()));
        Self(Value::Object(root))
    }

    /// Wrap a raw JSON value received from a caller.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self(value),
            Value::Null => Self(Value::Object(Map::new())),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                Self(Value::Object(map))
            }
        }
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.0.get("entity_type").and_then(Value::as_str)
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        self.0
            .get("entity_id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Resolve a dot path. A missing segment and an explicit JSON null both
    /// come back as `None`.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.0, path)
    }

    /// Resolve a dot path to a string, accepting numbers and booleans.
    pub fn resolve_string(&self, path: &str) -> Option<String> {
        self.resolve(path).and_then(scalar_to_string)
    }

    pub fn resolve_uuid(&self, path: &str) -> Option<Uuid> {
        self.resolve(path)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.to_string(), value);
        }
        self
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Walk `path` through objects (by key) and arrays (by numeric index).
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    if current.is_null() { None } else { Some(current) }
}

/// String form of a scalar; `None` for null, arrays and objects.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
