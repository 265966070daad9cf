use std::sync::Arc;

use crate::repositories::CampaignStore;
use crate::services::{BulkSender, Channel, RateLimitedMessenger, RateLimiter};
use crate::tests::fakes::{Harness, RecordingMessenger, RecordingWebhook};
use crate::tests::fixtures::LeadFixture;

async fn enrol(harness: &Harness, fixtures: Vec<LeadFixture>) -> uuid::Uuid {
    let campaign = harness.store.add_campaign("Spring open house");
    for fixture in fixtures {
        let inputs = fixture.build();
        let id = inputs.lead.id;
        harness.store.insert_lead(inputs);
        harness.store.add_recipient(campaign.id, "lead", id).await.unwrap();
    }
    campaign.id
}

#[tokio::test]
async fn test_broadcast_renders_per_recipient() {
    let harness = Harness::new();
    let campaign_id = enrol(
        &harness,
        vec![
            LeadFixture::default().named("Ana Ruiz"),
            LeadFixture::default().named("Ben Okafor"),
            LeadFixture::default().named("Chen Wei").without_phone(),
        ],
    )
    .await;

    let limiter = Arc::new(RateLimiter::new(0.001, 10));
    let messenger = Arc::new(RateLimitedMessenger::new(harness.messenger.clone(), limiter.clone()));
    let sender = BulkSender::new(harness.store.clone(), messenger, 2);

    let report = sender
        .broadcast(campaign_id, Channel::Sms, "", "Hi {{recipient.name}}, doors open at 10")
        .await
        .unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);

    let mut bodies: Vec<String> = harness.messenger.sent().into_iter().map(|m| m.body).collect();
    bodies.sort();
    assert_eq!(
        bodies,
        vec![
            "Hi Ana Ruiz, doors open at 10".to_string(),
            "Hi Ben Okafor, doors open at 10".to_string(),
        ]
    );
    assert_eq!(limiter.available(), 8);
}

#[tokio::test]
async fn test_rejected_sends_are_counted() {
    let harness = Harness::with(RecordingMessenger::failing(), RecordingWebhook::responding(200));
    let campaign_id = enrol(&harness, vec![LeadFixture::default(), LeadFixture::default()]).await;
    let sender = BulkSender::new(harness.store.clone(), harness.messenger.clone(), 4);

    let report = sender
        .broadcast(campaign_id, Channel::Email, "News for {{recipient.name}}", "Listing update")
        .await
        .unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);
    let sent = harness.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.channel == "email" && m.subject.as_deref().unwrap().starts_with("News for ")));
}

#[tokio::test]
async fn test_empty_campaign_sends_nothing() {
    let harness = Harness::new();
    let campaign_id = enrol(&harness, Vec::new()).await;
    let sender = BulkSender::new(harness.store.clone(), harness.messenger.clone(), 4);

    let report = sender
        .broadcast(campaign_id, Channel::Whatsapp, "", "Hello")
        .await
        .unwrap();

    assert_eq!(report, Default::default());
    assert!(harness.messenger.sent().is_empty());
}
