use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use realty_shared::Grade;

use crate::scoring::{LeadScoringService, RoutingDecision, ScoreTierRouter, ScoringConfig, ScoringError};
use crate::tests::fakes::Harness;
use crate::tests::fixtures::{agent, hot_lead, LeadFixture};
use crate::tests::helpers::{init_tracing, TEST_ACTION_TIMEOUT};
use crate::workflows::ActionType;

fn scoring_with(harness: &Harness, config: ScoringConfig) -> LeadScoringService {
    init_tracing();
    let config = Arc::new(config);
    let router = Arc::new(ScoreTierRouter::new(
        harness.dispatcher(TEST_ACTION_TIMEOUT),
        harness.store.clone(),
        harness.store.clone(),
        config.routing.clone(),
    ));
    LeadScoringService::new(harness.store.clone(), config).with_router(router)
}

fn scoring(harness: &Harness) -> LeadScoringService {
    scoring_with(harness, ScoringConfig::default())
}

#[tokio::test]
async fn test_hot_lead_goes_to_best_agent() {
    let harness = Harness::new();
    *harness.store.average_price.lock().unwrap() = Some(500_000.0);
    let overloaded = agent("Overloaded", 12, Some(15.0), 25);
    let closer = agent("Closer", 8, Some(20.0), 3);
    let slower = agent("Slower", 8, Some(45.0), 1);
    harness
        .store
        .agents
        .lock()
        .unwrap()
        .extend([overloaded, closer.clone(), slower]);

    let lead = hot_lead();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let result = scoring(&harness).calculate_score(lead_id).await.unwrap();

    assert_eq!(result.record.score, 100.0);
    assert_eq!(result.record.grade, Grade::A);
    assert_eq!(result.record.factors.budget, 30.0);
    assert_eq!(result.record.factors.engagement, 25.0);

    let routing = result.routing.unwrap();
    assert_eq!(routing.decision, RoutingDecision::BestAgent);
    assert_eq!(routing.owner, Some(closer.user_id));
    assert!(routing.newly_assigned);
    assert!(routing.actions.iter().all(|a| a.success));

    let stored = harness.store.entity("lead", lead_id).unwrap();
    assert_eq!(stored["assigned_to"], closer.user_id.to_string());

    let tasks = harness.store.tasks.lock().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, "urgent");
    assert_eq!(tasks[0].assigned_to, Some(closer.user_id));
    assert_eq!(tasks[0].title, "Urgent follow-up: Jane Doe");
    let due_in = tasks[0].due_at - Utc::now();
    assert!(due_in > Duration::minutes(55) && due_in <= Duration::hours(1));

    let notifications = harness.store.notifications.lock().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, closer.user_id);
    assert!(notifications[0].message.contains("Jane Doe scored 100"));
}

#[tokio::test]
async fn test_owned_lead_keeps_its_agent() {
    let harness = Harness::new();
    let owner = Uuid::new_v4();
    harness.store.agents.lock().unwrap().push(agent("Closer", 9, Some(10.0), 0));

    let mut lead = hot_lead();
    lead.lead.assigned_to = Some(owner);
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let routing = scoring(&harness)
        .calculate_score(lead_id)
        .await
        .unwrap()
        .routing
        .unwrap();

    assert_eq!(routing.owner, Some(owner));
    assert!(!routing.newly_assigned);
    assert!(routing.actions.iter().all(|a| a.action_type != ActionType::AssignToUser));
    assert_eq!(harness.store.tasks.lock().unwrap()[0].assigned_to, Some(owner));
}

#[tokio::test]
async fn test_grade_b_without_agents_stays_unassigned() {
    let harness = Harness::new();
    let lead = LeadFixture::default()
        .named("Sam Lee")
        .status("contacted")
        .engagement(5, 1, 0)
        .active_days_ago(0)
        .build();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let result = scoring(&harness).calculate_score(lead_id).await.unwrap();

    assert_eq!(result.record.score, 73.0);
    assert_eq!(result.record.grade, Grade::B);

    let routing = result.routing.unwrap();
    assert_eq!(routing.decision, RoutingDecision::RoundRobin);
    assert_eq!(routing.owner, None);
    assert!(harness.store.notifications.lock().unwrap().is_empty());

    let tasks = harness.store.tasks.lock().unwrap().clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, "high");
    assert_eq!(tasks[0].assigned_to, None);
}

#[tokio::test]
async fn test_round_robin_prefers_lightest_load() {
    let harness = Harness::new();
    let busy = agent("Busy", 20, Some(5.0), 6);
    let idle = agent("Idle", 0, None, 1);
    harness.store.agents.lock().unwrap().extend([busy, idle.clone()]);

    let lead = LeadFixture::default()
        .status("contacted")
        .engagement(5, 1, 0)
        .active_days_ago(0)
        .build();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let routing = scoring(&harness)
        .calculate_score(lead_id)
        .await
        .unwrap()
        .routing
        .unwrap();

    assert_eq!(routing.owner, Some(idle.user_id));
    let due_in = harness.store.tasks.lock().unwrap()[0].due_at - Utc::now();
    assert!(due_in > Duration::hours(23));
}

#[tokio::test]
async fn test_lukewarm_lead_joins_nurture_campaign() {
    let harness = Harness::new();
    let lead = LeadFixture::default().active_days_ago(10).build();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);
    let service = scoring(&harness);

    let result = service.calculate_score(lead_id).await.unwrap();

    assert_eq!(result.record.score, 48.0);
    assert_eq!(result.record.grade, Grade::D);
    assert_eq!(result.routing.unwrap().decision, RoutingDecision::Nurture);

    let campaigns = harness.store.campaigns.lock().unwrap().clone();
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].name, "nurture");
    assert!(campaigns[0].is_standing);

    // Rescoring reuses the campaign and does not duplicate the recipient
    service.calculate_score(lead_id).await.unwrap();
    assert_eq!(harness.store.campaigns.lock().unwrap().len(), 1);
    let recipients = harness.store.recipients.lock().unwrap().clone();
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].entity_id, lead_id);
    assert!(harness.store.tasks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cold_lead_has_no_side_effects() {
    let harness = Harness::new();
    let mut lead = LeadFixture::default().source("billboard").without_phone().build();
    lead.lead.email = None;
    lead.lead.created_at = Utc::now() - Duration::days(60);
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let result = scoring(&harness).calculate_score(lead_id).await.unwrap();

    assert_eq!(result.record.score, 27.0);
    assert_eq!(result.record.grade, Grade::E);
    let routing = result.routing.unwrap();
    assert_eq!(routing.decision, RoutingDecision::NoAction);
    assert!(routing.actions.is_empty());
    assert!(harness.store.tasks.lock().unwrap().is_empty());
    assert!(harness.store.campaigns.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rescoring_overwrites_the_single_record() {
    let harness = Harness::new();
    let lead = hot_lead();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);
    let service = LeadScoringService::new(harness.store.clone(), Arc::new(ScoringConfig::default()));

    let first = service.calculate_score(lead_id).await.unwrap();
    let second = service.calculate_score(lead_id).await.unwrap();

    assert!(first.routing.is_none());
    assert_eq!(first.record.score, second.record.score);
    assert_eq!(first.record.factors, second.record.factors);
    assert!(second.record.last_calculated >= first.record.last_calculated);

    let scores = harness.store.scores.lock().unwrap().clone();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[&lead_id], second.record);
    assert_eq!(service.get_score(lead_id).await.unwrap(), second.record);
}

#[tokio::test]
async fn test_unknown_lead_is_not_found() {
    let harness = Harness::new();
    let service = scoring(&harness);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.calculate_score(missing).await,
        Err(ScoringError::NotFound(id)) if id == missing
    ));
    assert!(matches!(service.get_score(missing).await, Err(ScoringError::NotFound(_))));
    assert!(harness.store.scores.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_run_counts_failures_without_aborting() {
    let harness = Harness::new();
    let ghost = Uuid::new_v4();
    harness.store.insert_lead(hot_lead());
    harness.store.insert_lead(LeadFixture::default().build());
    harness.store.ghost_leads.lock().unwrap().push(ghost);

    let report = scoring(&harness)
        .with_bulk_concurrency(2)
        .bulk_calculate_scores()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].lead_id, ghost);
    assert_eq!(harness.store.scores.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_oversized_source_table_never_reaches_the_pipeline() {
    let mut config = ScoringConfig::default();
    config.caps.source = 500.0;
    config.source_scores.insert("referral".to_string(), 500.0);
    assert!(config.validate().is_err());

    let harness = Harness::new();
    let lead = hot_lead();
    let lead_id = lead.lead.id;
    harness.store.insert_lead(lead);

    let result = scoring(&harness).calculate_score(lead_id).await.unwrap();

    assert_eq!(result.record.factors.source, 15.0);
    assert_eq!(result.record.score, 100.0);
    assert_eq!(result.record.grade, Grade::A);
}
