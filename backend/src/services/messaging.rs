// Messaging - Email / SMS / WhatsApp delivery behind one contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::email::EmailService;
use super::rate_limit::RateLimiter;
use crate::config::MessagingConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppReceipt {
    pub success: bool,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Whatsapp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::Whatsapp),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// Delivery collaborator. Each call reports success only; delivery
/// receipts and retries are the transport's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool;

    async fn send_sms(&self, to: &str, body: &str) -> bool;

    async fn send_whatsapp(&self, to: &str, body: &str) -> WhatsAppReceipt;
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    #[serde(default, alias = "message_id")]
    id: Option<String>,
}

/// SMTP for email, JSON-over-HTTP gateways for SMS and WhatsApp
pub struct GatewayMessenger {
    email: Option<EmailService>,
    http: reqwest::Client,
    sms_gateway_url: Option<String>,
    whatsapp_gateway_url: Option<String>,
    api_token: Option<String>,
}

impl GatewayMessenger {
    pub fn new(email: Option<EmailService>, config: &MessagingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            email,
            http,
            sms_gateway_url: config.sms_gateway_url.clone(),
            whatsapp_gateway_url: config.whatsapp_gateway_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    async fn post_gateway(&self, channel: Channel, url: Option<&str>, to: &str, body: &str) -> Option<GatewayReply> {
        let Some(url) = url else {
            warn!("No {} gateway configured, dropping message to {}", channel, to);
            return None;
        };

        let mut request = self.http.post(url).json(&serde_json::json!({
            "to": to,
            "message": body
        }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!("{} sent to {}", channel, to);
                Some(response.json::<GatewayReply>().await.unwrap_or(GatewayReply { id: None }))
            }
            Ok(response) => {
                warn!("{} gateway rejected message to {}: HTTP {}", channel, to, response.status());
                None
            }
            Err(e) => {
                error!("{} gateway unreachable: {}", channel, e);
                None
            }
        }
    }
}

#[async_trait]
impl Messenger for GatewayMessenger {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool {
        match &self.email {
            Some(service) => service.send_email(to, subject, body).await.is_ok(),
            None => {
                warn!("SMTP not configured, dropping email to {}", to);
                false
            }
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> bool {
        self.post_gateway(Channel::Sms, self.sms_gateway_url.as_deref(), to, body)
            .await
            .is_some()
    }

    async fn send_whatsapp(&self, to: &str, body: &str) -> WhatsAppReceipt {
        match self
            .post_gateway(Channel::Whatsapp, self.whatsapp_gateway_url.as_deref(), to, body)
            .await
        {
            Some(reply) => WhatsAppReceipt {
                success: true,
                id: reply.id,
            },
            None => WhatsAppReceipt::default(),
        }
    }
}

/// Wraps any messenger so every send first takes a token from the shared bucket.
pub struct RateLimitedMessenger {
    inner: Arc<dyn Messenger>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedMessenger {
    pub fn new(inner: Arc<dyn Messenger>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl Messenger for RateLimitedMessenger {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> bool {
        self.limiter.acquire().await;
        self.inner.send_email(to, subject, body).await
    }

    async fn send_sms(&self, to: &str, body: &str) -> bool {
        self.limiter.acquire().await;
        self.inner.send_sms(to, body).await
    }

    async fn send_whatsapp(&self, to: &str, body: &str) -> WhatsAppReceipt {
        self.limiter.acquire().await;
        self.inner.send_whatsapp(to, body).await
    }
}
