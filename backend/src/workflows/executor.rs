// Action Dispatcher - Executes workflow actions against external collaborators

use chrono::{TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use realty_shared::{NewNotification, NewTask};

use super::error::ActionError;
use super::{template, ActionOutput, ActionSpec, ActionType, EventPayload, TriggerType};
use crate::repositories::{CampaignStore, EntityStore, NotificationStore, TaskStore};
use crate::services::{DocumentGenerator, HttpMethod, Messenger, WebhookClient, WebhookRequest};

/// Everything the dispatcher delegates to
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityStore>,
    pub messenger: Arc<dyn Messenger>,
    pub tasks: Arc<dyn TaskStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub campaigns: Arc<dyn CampaignStore>,
    pub documents: Arc<dyn DocumentGenerator>,
    pub webhooks: Arc<dyn WebhookClient>,
}

type Config = Map<String, Value>;
type Handler =
    for<'a> fn(&'a ActionDispatcher, &'a Config, &'a EventPayload) -> BoxFuture<'a, Result<ActionOutput, ActionError>>;

/// Maps each action kind to its handler. Exhaustive: adding an `ActionType`
/// without a handler does not compile.
fn handler_for(action_type: ActionType) -> Handler {
    match action_type {
        ActionType::AssignToUser => |d, c, p| d.assign_to_user(c, p).boxed(),
        ActionType::UpdateStatus => |d, c, p| d.update_status(c, p).boxed(),
        ActionType::SendEmail => |d, c, p| d.send_email(c, p).boxed(),
        ActionType::SendSms => |d, c, p| d.send_sms(c, p).boxed(),
        ActionType::SendWhatsapp => |d, c, p| d.send_whatsapp(c, p).boxed(),
        ActionType::CreateTask => |d, c, p| d.create_task(c, p).boxed(),
        ActionType::CreateNotification => |d, c, p| d.create_notification(c, p).boxed(),
        ActionType::AddToCampaign => |d, c, p| d.add_to_campaign(c, p).boxed(),
        ActionType::GenerateDocument => |d, c, p| d.generate_document(c, p).boxed(),
        ActionType::Webhook => |d, c, p| d.webhook(c, p).boxed(),
    }
}

pub struct ActionDispatcher {
    collaborators: Collaborators,
    action_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(collaborators: Collaborators, action_timeout: Duration) -> Self {
        Self {
            collaborators,
            action_timeout,
        }
    }

    pub fn action_timeout(&self) -> Duration {
        self.action_timeout
    }

    /// Render the action's config against the payload and run its handler
    /// under the per-action timeout.
    pub async fn execute(&self, action: &ActionSpec, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        debug!("Dispatching {} action", action.action_type);

        let config = match template::render_value(&Value::Object(action.config.clone()), payload) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let handler = handler_for(action.action_type);
        match tokio::time::timeout(self.action_timeout, handler(self, &config, payload)).await {
            Ok(result) => result,
            Err(_) => Err(ActionError::Timeout(self.action_timeout.as_secs())),
        }
    }

    // ===== Action Implementations =====

    async fn assign_to_user(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let user_id = required_uuid(config, "user_id")?;
        let (entity_type, entity_id) = target(payload)?;

        self.collaborators
            .entities
            .update_field(entity_type, entity_id, "assigned_to", serde_json::json!(user_id))
            .await?;

        info!("Assigned {} {} to {}", entity_type, entity_id, user_id);
        Ok(ActionOutput::new(serde_json::json!({
            "entity_type": entity_type,
            "entity_id": entity_id,
            "assigned_to": user_id
        })))
    }

    async fn update_status(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let status = required_str(config, "status")?;
        let (entity_type, entity_id) = target(payload)?;

        let mut entity = self.collaborators.entities.get_entity(entity_type, entity_id).await?;
        let old_status = entity.get("status").cloned().unwrap_or(Value::Null);

        self.collaborators
            .entities
            .update_field(entity_type, entity_id, "status", Value::String(status.to_string()))
            .await?;

        let mut output = ActionOutput::new(serde_json::json!({
            "entity_type": entity_type,
            "entity_id": entity_id,
            "old_status": old_status,
            "new_status": status
        }));

        if entity_type == "lead" {
            if let Value::Object(map) = &mut entity {
                map.insert("status".to_string(), Value::String(status.to_string()));
            }
            let follow_up = EventPayload::new(
                "lead",
                entity_id,
                serde_json::json!({
                    "lead": entity,
                    "old_status": old_status,
                    "new_status": status,
                    "user_id": payload.resolve("user_id").cloned()
                }),
            );
            output = output.with_event(TriggerType::LeadStatusChanged, follow_up);
        }

        Ok(output)
    }

    async fn send_email(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let to = recipient(config, payload)?;
        let subject = optional_str(config, "subject").unwrap_or_default();
        let body = message_body(config)?;

        if !self.collaborators.messenger.send_email(&to, subject, body).await {
            return Err(ActionError::DeliveryFailed(format!("email to {} was not accepted", to)));
        }

        Ok(ActionOutput::new(serde_json::json!({ "channel": "email", "to": to })))
    }

    async fn send_sms(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let to = recipient(config, payload)?;
        let body = message_body(config)?;

        if !self.collaborators.messenger.send_sms(&to, body).await {
            return Err(ActionError::DeliveryFailed(format!("sms to {} was not accepted", to)));
        }

        Ok(ActionOutput::new(serde_json::json!({ "channel": "sms", "to": to })))
    }

    async fn send_whatsapp(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let to = recipient(config, payload)?;
        let body = message_body(config)?;

        let receipt = self.collaborators.messenger.send_whatsapp(&to, body).await;
        if !receipt.success {
            return Err(ActionError::DeliveryFailed(format!("whatsapp to {} was not accepted", to)));
        }

        Ok(ActionOutput::new(serde_json::json!({
            "channel": "whatsapp",
            "to": to,
            "message_id": receipt.id
        })))
    }

    async fn create_task(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let title = required_str(config, "title")?;

        let assigned_to = match optional_uuid(config, "assigned_to")? {
            Some(user) => Some(user),
            None => payload.resolve_uuid("user_id"),
        };

        let (key, offset) = match optional_i64(config, "due_in_hours")? {
            Some(hours) => ("due_in_hours", TimeDelta::try_hours(hours)),
            None => (
                "due_in_days",
                TimeDelta::try_days(optional_i64(config, "due_in_days")?.unwrap_or(1)),
            ),
        };
        let due_at = offset
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .ok_or_else(|| ActionError::invalid(key, "due date is out of range"))?;

        let task = self
            .collaborators
            .tasks
            .create_task(NewTask {
                title: title.to_string(),
                description: optional_str(config, "description").unwrap_or_default().to_string(),
                assigned_to,
                priority: optional_str(config, "priority").unwrap_or("medium").to_string(),
                entity_type: payload.entity_type().map(str::to_string),
                entity_id: payload.entity_id(),
                due_at,
            })
            .await?;

        Ok(ActionOutput::new(serde_json::json!({
            "task_id": task.id,
            "assigned_to": task.assigned_to,
            "due_at": task.due_at
        })))
    }

    async fn create_notification(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let user_id = match optional_uuid(config, "user_id")? {
            Some(user) => user,
            None => payload
                .resolve_uuid("user_id")
                .or_else(|| {
                    payload
                        .entity_type()
                        .and_then(|et| payload.resolve_uuid(&format!("{}.assigned_to", et)))
                })
                .ok_or_else(|| ActionError::missing("user_id"))?,
        };
        let title = required_str(config, "title")?;

        let notification = self
            .collaborators
            .notifications
            .create_notification(NewNotification {
                user_id,
                title: title.to_string(),
                message: optional_str(config, "message").unwrap_or_default().to_string(),
                notification_type: optional_str(config, "type").unwrap_or("info").to_string(),
                entity_type: payload.entity_type().map(str::to_string),
                entity_id: payload.entity_id(),
            })
            .await?;

        Ok(ActionOutput::new(serde_json::json!({
            "notification_id": notification.id,
            "user_id": user_id
        })))
    }

    async fn add_to_campaign(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let campaign_id = required_uuid(config, "campaign_id")?;
        let (entity_type, entity_id) = target(payload)?;

        let added = self
            .collaborators
            .campaigns
            .add_recipient(campaign_id, entity_type, entity_id)
            .await?;

        if !added {
            debug!("{} {} already in campaign {}", entity_type, entity_id, campaign_id);
        }

        Ok(ActionOutput::new(serde_json::json!({
            "campaign_id": campaign_id,
            "added": added
        })))
    }

    /// Fire-and-forget: the job is spawned and the action reports success
    /// immediately. Generation failures surface only in the log.
    async fn generate_document(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let template_id = required_str(config, "template_id")?.to_string();
        let (entity_type, entity_id) = target(payload)?;
        let entity_type = entity_type.to_string();

        let documents = Arc::clone(&self.collaborators.documents);
        let job_template = template_id.clone();
        tokio::spawn(async move {
            match documents.generate(&job_template, &entity_type, entity_id).await {
                Ok(path) => info!("Document '{}' generated at {}", job_template, path),
                Err(e) => warn!("Document '{}' for {} failed: {}", job_template, entity_id, e),
            }
        });

        Ok(ActionOutput::new(serde_json::json!({
            "queued": true,
            "template_id": template_id
        })))
    }

    async fn webhook(&self, config: &Config, payload: &EventPayload) -> Result<ActionOutput, ActionError> {
        let raw_url = required_str(config, "url")?;
        let url = Url::parse(raw_url).map_err(|e| ActionError::invalid("url", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ActionError::invalid("url", format!("unsupported scheme '{}'", url.scheme())));
        }

        let method = match optional_str(config, "method") {
            Some(m) => HttpMethod::parse(m).ok_or_else(|| ActionError::invalid("method", m))?,
            None => HttpMethod::Post,
        };

        let headers = match config.get("headers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect(),
            Some(_) => return Err(ActionError::invalid("headers", "expected a map")),
        };

        let body = match method {
            HttpMethod::Get => None,
            _ => Some(
                config
                    .get("payload")
                    .cloned()
                    .unwrap_or_else(|| payload.as_value().clone()),
            ),
        };

        let response = self
            .collaborators
            .webhooks
            .send(WebhookRequest {
                url: url.clone(),
                method,
                headers,
                body,
            })
            .await
            .map_err(|e| {
                warn!("Webhook {} failed: {}", url, e);
                ActionError::DeliveryFailed(e.to_string())
            })?;

        info!("Webhook {} responded {}: {}", url, response.status, response.body);

        if !response.is_success() {
            let snippet: String = response.body.chars().take(200).collect();
            return Err(ActionError::DeliveryFailed(format!("HTTP {}: {}", response.status, snippet)));
        }

        Ok(ActionOutput::new(serde_json::json!({
            "status": response.status,
            "body": response.body
        })))
    }
}

// ===== Config helpers =====

fn optional_str<'a>(config: &'a Config, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(config: &'a Config, key: &str) -> Result<&'a str, ActionError> {
    optional_str(config, key).ok_or_else(|| ActionError::missing(key))
}

fn optional_uuid(config: &Config, key: &str) -> Result<Option<Uuid>, ActionError> {
    match optional_str(config, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ActionError::invalid(key, e)),
        None => match config.get(key) {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(None),
            Some(other) => Err(ActionError::invalid(key, format!("expected a UUID, got {}", other))),
        },
    }
}

fn required_uuid(config: &Config, key: &str) -> Result<Uuid, ActionError> {
    optional_uuid(config, key)?.ok_or_else(|| ActionError::missing(key))
}

fn optional_i64(config: &Config, key: &str) -> Result<Option<i64>, ActionError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| ActionError::invalid(key, n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ActionError::invalid(key, e)),
        Some(other) => Err(ActionError::invalid(key, other)),
    }
}

fn message_body(config: &Config) -> Result<&str, ActionError> {
    ["body", "message", "template"]
        .iter()
        .find_map(|key| optional_str(config, key))
        .ok_or_else(|| ActionError::missing("body"))
}

/// A literal/templated address, or `{"field": "lead.email"}`
fn recipient(config: &Config, payload: &EventPayload) -> Result<String, ActionError> {
    let value = config
        .get("recipient")
        .or_else(|| config.get("to"))
        .ok_or_else(|| ActionError::missing("recipient"))?;

    let resolved = match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(map) => {
            let path = map
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| ActionError::invalid("recipient", "field reference needs a 'field' path"))?;
            payload.resolve_string(path)
        }
        other => return Err(ActionError::invalid("recipient", other)),
    };

    resolved
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ActionError::Configuration("recipient resolved to an empty value".to_string()))
}

fn target(payload: &EventPayload) -> Result<(&str, Uuid), ActionError> {
    match (payload.entity_type(), payload.entity_id()) {
        (Some(entity_type), Some(entity_id)) => Ok((entity_type, entity_id)),
        _ => Err(ActionError::Configuration(
            "event payload has no entity_type/entity_id".to_string(),
        )),
    }
}
