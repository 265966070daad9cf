// Bulk Messaging - Campaign broadcasts with bounded concurrency

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use realty_shared::CampaignRecipient;

use super::messaging::{Channel, Messenger};
use crate::repositories::{CampaignStore, StoreError};
use crate::workflows::{template, EventPayload};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkSendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fans a templated message out to every campaign recipient.
///
/// Throughput is capped by the messenger's rate limiter; `concurrency`
/// bounds how many sends are in flight.
pub struct BulkSender {
    campaigns: Arc<dyn CampaignStore>,
    messenger: Arc<dyn Messenger>,
    concurrency: usize,
}

impl BulkSender {
    pub fn new(campaigns: Arc<dyn CampaignStore>, messenger: Arc<dyn Messenger>, concurrency: usize) -> Self {
        Self {
            campaigns,
            messenger,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn broadcast(
        &self,
        campaign_id: Uuid,
        channel: Channel,
        subject: &str,
        body_template: &str,
    ) -> Result<BulkSendReport, StoreError> {
        let recipients = self.campaigns.recipients(campaign_id).await?;
        info!(
            "Broadcasting {} message to {} recipients of campaign {}",
            channel,
            recipients.len(),
            campaign_id
        );

        let outcomes: Vec<bool> = stream::iter(recipients)
            .map(|recipient| self.send_one(recipient, channel, subject, body_template))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let sent = outcomes.iter().filter(|ok| **ok).count();
        let report = BulkSendReport {
            sent,
            failed: outcomes.len() - sent,
        };

        info!(
            "Campaign {} broadcast finished: {} sent, {} failed",
            campaign_id, report.sent, report.failed
        );
        Ok(report)
    }

    async fn send_one(&self, recipient: CampaignRecipient, channel: Channel, subject: &str, body_template: &str) -> bool {
        let payload = EventPayload::new(
            &recipient.entity_type,
            recipient.entity_id,
            serde_json::json!({ "recipient": &recipient }),
        );
        let subject = template::render(subject, &payload);
        let body = template::render(body_template, &payload);

        let address = match channel {
            Channel::Email => recipient.email.as_deref(),
            Channel::Sms | Channel::Whatsapp => recipient.phone.as_deref(),
        };
        let Some(address) = address.filter(|a| !a.trim().is_empty()) else {
            warn!("Recipient {} has no {} address", recipient.entity_id, channel);
            return false;
        };

        match channel {
            Channel::Email => self.messenger.send_email(address, &subject, &body).await,
            Channel::Sms => self.messenger.send_sms(address, &body).await,
            Channel::Whatsapp => self.messenger.send_whatsapp(address, &body).await.success,
        }
    }
}
