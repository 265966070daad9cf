use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::services::messaging::MockMessenger;
use crate::services::HttpMethod;
use crate::tests::fakes::{Harness, RecordingMessenger, RecordingWebhook};
use crate::tests::fixtures::{lead_payload, LeadFixture};
use crate::tests::helpers::{engine, eventually, init_tracing};
use crate::workflows::conditions::presets as when;
use crate::workflows::{
    ActionDispatcher, ActionSpec, ActionType, Condition, DispatchPhase, EngineError, EventSource,
    TriggerEvent, TriggerType, WorkflowEngine, WorkflowRuleInput,
};

fn lead_created(harness: &Harness) -> (Uuid, crate::workflows::EventPayload) {
    let inputs = LeadFixture::default().named("Jane Doe").source("referral").build();
    harness.store.insert_lead(inputs.clone());
    (inputs.lead.id, lead_payload(&inputs.lead))
}

#[tokio::test]
async fn test_disabled_rule_never_fires() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Dormant", TriggerType::LeadCreated)
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "high", 1))
            .disabled(),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert!(outcome.rules_fired.is_empty());
    assert!(outcome.actions.is_empty());
    assert_eq!(outcome.phase, DispatchPhase::Idle);
    assert!(harness.store.tasks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_one_false_condition_blocks_every_action() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Impossible", TriggerType::LeadCreated)
            .with_condition(Condition::equals("lead.status", json!("new")))
            .with_condition(Condition::greater_than("lead.score", 1_000_000.0))
            .with_action(ActionSpec::create_task("Never", "", "low", 1)),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.rules_considered, 1);
    assert!(outcome.rules_fired.is_empty());
    assert!(harness.store.tasks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_campaign_fails_alone() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    let rule = harness.store.add_rule(
        WorkflowRuleInput::new("Enroll and call", TriggerType::LeadCreated)
            .with_condition(when::referral_lead())
            .with_action(ActionSpec::add_to_campaign(Uuid::new_v4()))
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "high", 1)),
    );
    let (lead_id, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.rules_fired, vec![rule.id]);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 1);

    let enroll = &outcome.actions[0];
    assert!(!enroll.success);
    assert_eq!(enroll.error_kind.as_deref(), Some("not_found"));

    let call = &outcome.actions[1];
    assert!(call.success);
    let tasks = harness.store.tasks.lock().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Call Jane Doe");
    assert_eq!(tasks[0].entity_id, Some(lead_id));

    let logs = harness.store.execution_logs.lock().unwrap().clone();
    let outcomes: Vec<&str> = logs.iter().map(|l| l.outcome.as_str()).collect();
    assert_eq!(outcomes, vec!["failed", "success"]);
    assert!(logs[0].error.as_deref().unwrap().contains("not found"));
    assert_eq!(logs[1].event_payload_snapshot["lead"]["full_name"], "Jane Doe");

    assert_eq!(harness.store.rule(rule.id).unwrap().execution_count, 1);
}

#[tokio::test]
async fn test_webhook_receives_rendered_body() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Notify CRM", TriggerType::LeadCreated)
            .with_action(ActionSpec::webhook("https://x", json!({ "msg": "Hello {{lead.full_name}}" }))),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.succeeded, 1);
    let requests = harness.webhook.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url.as_str(), "https://x/");
    assert_eq!(requests[0].body, Some(json!({ "msg": "Hello Jane Doe" })));
}

#[tokio::test]
async fn test_webhook_server_error_does_not_stop_the_rule() {
    let harness = Harness::with(RecordingMessenger::new(), RecordingWebhook::responding(500));
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Sync then call", TriggerType::LeadCreated)
            .with_action(ActionSpec::webhook("https://hooks.example.com/leads", json!({ "id": "{{entity_id}}" })))
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "medium", 1)),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions[0].error_kind.as_deref(), Some("delivery_failed"));
    assert!(outcome.actions[0].error.as_deref().unwrap().contains("HTTP 500"));
    assert!(outcome.actions[1].success);
    assert_eq!(harness.store.tasks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_slow_action_times_out_and_the_next_runs() {
    init_tracing();
    let harness = Harness::with(RecordingMessenger::new(), RecordingWebhook::hanging(Duration::from_secs(5)));
    let engine = WorkflowEngine::new(
        harness.store.clone(),
        harness.dispatcher(Duration::from_millis(50)),
        3,
    );
    harness.store.add_rule(
        WorkflowRuleInput::new("Slow partner", TriggerType::LeadCreated)
            .with_action(ActionSpec::webhook("https://slow.example.com", json!({})))
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "medium", 1)),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions[0].error_kind.as_deref(), Some("timeout"));
    assert!(outcome.actions[0].duration_ms < 5_000);
    assert!(outcome.actions[1].success);
}

#[tokio::test]
async fn test_rejected_email_is_delivery_failure() {
    init_tracing();
    let harness = Harness::new();
    let mut messenger = MockMessenger::new();
    messenger
        .expect_send_email()
        .withf(|to, subject, _| to.contains('@') && subject == "Welcome, Jane Doe")
        .times(1)
        .returning(|_, _, _| false);

    let dispatcher = Arc::new(ActionDispatcher::new(
        harness.collaborators_with_messenger(Arc::new(messenger)),
        Duration::from_secs(2),
    ));
    let engine = WorkflowEngine::new(harness.store.clone(), dispatcher, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Welcome", TriggerType::LeadCreated)
            .with_action(ActionSpec::send_email("{{lead.email}}", "Welcome, {{lead.full_name}}", "Hi!"))
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "medium", 1)),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions[0].action_type, ActionType::SendEmail);
    assert_eq!(outcome.actions[0].error_kind.as_deref(), Some("delivery_failed"));
    assert!(outcome.actions[1].success);
}

#[tokio::test]
async fn test_missing_recipient_is_configuration_error() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Text the lead", TriggerType::LeadCreated)
            .with_action(ActionSpec::send_sms("{{lead.phone_number}}", "Hello")),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions[0].error_kind.as_deref(), Some("configuration_error"));
    assert!(harness.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_out_of_range_due_date_fails_alone() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Far future", TriggerType::LeadCreated)
            .with_action(ActionSpec::create_task("Far", "", "low", 100_000_000))
            .with_action(
                ActionSpec::create_task("Later", "", "low", 1).with_config("due_in_hours", json!(i64::MAX)),
            )
            .with_action(ActionSpec::create_task("Call {{lead.full_name}}", "", "medium", 1)),
    );
    let (_, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions.len(), 3);
    assert_eq!(outcome.actions[0].error_kind.as_deref(), Some("configuration_error"));
    assert_eq!(outcome.actions[1].error_kind.as_deref(), Some("configuration_error"));
    assert!(outcome.actions[2].success);

    let tasks = harness.store.tasks.lock().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Call Jane Doe");
}

#[tokio::test]
async fn test_notification_falls_back_to_entity_owner() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    let owner = Uuid::new_v4();
    let inputs = LeadFixture::default().assigned_to(owner).build();
    harness.store.insert_lead(inputs.clone());
    harness.store.add_rule(
        WorkflowRuleInput::new("Ping owner", TriggerType::LeadCreated)
            .with_action(ActionSpec::create_notification("New lead", "{{lead.full_name}}", "info")),
    );

    engine
        .process_trigger(TriggerType::LeadCreated, lead_payload(&inputs.lead))
        .await
        .unwrap();

    let notifications = harness.store.notifications.lock().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, owner);
    assert_eq!(notifications[0].message, inputs.lead.full_name);
}

#[tokio::test]
async fn test_document_generation_is_queued() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    harness.store.add_rule(
        WorkflowRuleInput::new("Brochure", TriggerType::LeadCreated)
            .with_action(ActionSpec::generate_document("brochure")),
    );
    let (lead_id, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.actions[0].output, Some(json!({ "queued": true, "template_id": "brochure" })));
    let documents = harness.documents.clone();
    assert!(
        eventually(|| {
            let documents = documents.clone();
            async move { documents.generated.lock().unwrap().len() == 1 }
        })
        .await
    );
    assert_eq!(harness.documents.generated.lock().unwrap()[0].2, lead_id);
}

#[tokio::test]
async fn test_unreadable_rule_table_is_a_hard_error() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    *harness.store.rules_unavailable.lock().unwrap() = true;
    let (_, payload) = lead_created(&harness);

    let result = engine.process_trigger(TriggerType::LeadCreated, payload).await;

    assert!(matches!(result, Err(EngineError::StoreUnavailable(_))));
}

fn status_chain(harness: &Harness) {
    harness.store.add_rule(
        WorkflowRuleInput::new("Contact new leads", TriggerType::LeadCreated)
            .with_action(ActionSpec::update_status("contacted")),
    );
    harness.store.add_rule(
        WorkflowRuleInput::new("Qualify contacted", TriggerType::LeadStatusChanged)
            .with_condition(when::status_changed_to("contacted"))
            .with_action(ActionSpec::update_status("qualified")),
    );
    harness.store.add_rule(
        WorkflowRuleInput::new("Negotiate qualified", TriggerType::LeadStatusChanged)
            .with_condition(when::status_changed_to("qualified"))
            .with_action(ActionSpec::update_status("negotiating")),
    );
}

fn lead_status(harness: &Harness, lead_id: Uuid) -> String {
    harness.store.entity("lead", lead_id).unwrap()["status"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_process_trigger_does_not_follow_emitted_events() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    status_chain(&harness);
    let (lead_id, payload) = lead_created(&harness);

    let outcome = engine.process_trigger(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(outcome.emitted.len(), 1);
    assert_eq!(outcome.emitted[0].trigger_type, TriggerType::LeadStatusChanged);
    assert_eq!(outcome.emitted[0].payload.resolve_string("new_status").as_deref(), Some("contacted"));
    assert_eq!(outcome.emitted[0].payload.resolve_string("old_status").as_deref(), Some("new"));
    assert_eq!(lead_status(&harness, lead_id), "contacted");
}

#[tokio::test]
async fn test_api_event_runs_like_a_single_trigger() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    status_chain(&harness);
    let (lead_id, payload) = lead_created(&harness);

    let event = TriggerEvent::new(TriggerType::LeadCreated, payload, EventSource::Api);
    let outcome = engine.process_event(event).await.unwrap();

    assert_eq!(outcome.rules_fired.len(), 1);
    assert_eq!(outcome.emitted.len(), 1);
    assert_eq!(lead_status(&harness, lead_id), "contacted");
}

#[tokio::test]
async fn test_cascade_stops_at_chain_depth() {
    let harness = Harness::new();
    let engine = engine(&harness, 1);
    status_chain(&harness);
    let (lead_id, payload) = lead_created(&harness);

    let cascade = engine.process_cascade(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(cascade.dispatches.len(), 2);
    assert_eq!(cascade.dropped_events, 1);
    assert_eq!(lead_status(&harness, lead_id), "qualified");
}

#[tokio::test]
async fn test_cascade_runs_the_full_chain_within_depth() {
    let harness = Harness::new();
    let engine = engine(&harness, 3);
    status_chain(&harness);
    let (lead_id, payload) = lead_created(&harness);

    let cascade = engine.process_cascade(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(cascade.dispatches.len(), 4);
    assert_eq!(cascade.dropped_events, 0);
    assert_eq!(cascade.failed(), 0);
    assert_eq!(lead_status(&harness, lead_id), "negotiating");
}

#[tokio::test]
async fn test_self_triggering_rule_fires_once_per_entity() {
    let harness = Harness::new();
    let engine = engine(&harness, 10);
    harness.store.add_rule(
        WorkflowRuleInput::new("Contact new leads", TriggerType::LeadCreated)
            .with_action(ActionSpec::update_status("contacted")),
    );
    let echo = harness.store.add_rule(
        WorkflowRuleInput::new("Echo", TriggerType::LeadStatusChanged)
            .with_action(ActionSpec::update_status("qualified")),
    );
    let (lead_id, payload) = lead_created(&harness);

    let cascade = engine.process_cascade(TriggerType::LeadCreated, payload).await.unwrap();

    assert_eq!(cascade.dispatches.len(), 3);
    assert!(cascade.dispatches[2].rules_fired.is_empty());
    assert_eq!(harness.store.rule(echo.id).unwrap().execution_count, 1);
    assert_eq!(lead_status(&harness, lead_id), "qualified");
}
