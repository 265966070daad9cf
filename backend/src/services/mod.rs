pub mod bulk_messaging;
pub mod documents;
pub mod email;
pub mod messaging;
pub mod rate_limit;
pub mod webhook;

pub use bulk_messaging::{BulkSendReport, BulkSender};
pub use documents::{DocumentGenerator, QueuedDocumentGenerator};
pub use email::EmailService;
pub use messaging::{Channel, GatewayMessenger, Messenger, RateLimitedMessenger, WhatsAppReceipt};
pub use rate_limit::RateLimiter;
pub use webhook::{HttpMethod, HttpWebhookClient, WebhookClient, WebhookError, WebhookRequest, WebhookResponse};
