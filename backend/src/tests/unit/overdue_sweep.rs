use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use realty_shared::NewTask;

use crate::config::ScheduleConfig;
use crate::jobs::scheduler::OVERDUE_TASKS;
use crate::jobs::{JobError, JobScheduler, JobStatus, OverdueTaskSweep};
use crate::repositories::TaskStore;
use crate::scoring::{LeadScoringService, ScoringConfig};
use crate::tests::fakes::Harness;
use crate::tests::helpers::shared_engine;
use crate::workflows::rule::presets;

async fn task_due(harness: &Harness, title: &str, assigned_to: Option<Uuid>, due_in: Duration) -> Uuid {
    harness
        .store
        .create_task(NewTask {
            title: title.to_string(),
            description: String::new(),
            assigned_to,
            priority: "medium".to_string(),
            entity_type: None,
            entity_id: None,
            due_at: Utc::now() + due_in,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_overdue_task_notifies_owner_once() {
    let harness = Harness::new();
    harness.store.add_rule(presets::overdue_task_reminder());
    let owner = Uuid::new_v4();
    let late = task_due(&harness, "Send contract", Some(owner), Duration::hours(-2)).await;
    task_due(&harness, "Viewing prep", Some(owner), Duration::hours(3)).await;

    let sweep = OverdueTaskSweep::new(harness.store.clone(), shared_engine(&harness, 3));
    let first = sweep.run().await.unwrap();

    assert_eq!(first.tasks_found, 1);
    assert_eq!(first.triggers_fired, 1);
    assert_eq!(first.actions_failed, 0);
    assert!(first.errors.is_empty());

    let notifications = harness.store.notifications.lock().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, owner);
    assert_eq!(notifications[0].entity_id, Some(late));
    assert!(notifications[0].message.starts_with("'Send contract' was due"));

    let flagged: Vec<Uuid> = harness
        .store
        .tasks
        .lock()
        .unwrap()
        .iter()
        .filter(|t| t.overdue_notified)
        .map(|t| t.id)
        .collect();
    assert_eq!(flagged, vec![late]);

    let second = sweep.run().await.unwrap();
    assert_eq!(second.tasks_found, 0);
    assert_eq!(harness.store.notifications.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unowned_task_counts_as_failed_action() {
    let harness = Harness::new();
    harness.store.add_rule(presets::overdue_task_reminder());
    task_due(&harness, "Orphan", None, Duration::minutes(-5)).await;

    let result = OverdueTaskSweep::new(harness.store.clone(), shared_engine(&harness, 3))
        .run()
        .await
        .unwrap();

    assert_eq!(result.triggers_fired, 1);
    assert_eq!(result.actions_failed, 1);
    assert!(harness.store.notifications.lock().unwrap().is_empty());
    assert!(harness.store.tasks.lock().unwrap()[0].overdue_notified);
}

#[tokio::test]
async fn test_manual_run_is_logged() {
    let harness = Harness::new();
    harness.store.add_rule(presets::overdue_task_reminder());
    task_due(&harness, "Send contract", Some(Uuid::new_v4()), Duration::hours(-1)).await;

    let scheduler = JobScheduler::new(
        Arc::new(LeadScoringService::new(harness.store.clone(), Arc::new(ScoringConfig::default()))),
        shared_engine(&harness, 3),
        harness.store.clone(),
        ScheduleConfig {
            score_recalc_cron: "0 0 2 * * *".to_string(),
            task_overdue_cron: "0 0 * * * *".to_string(),
            bulk_score_concurrency: 2,
        },
    )
    .await
    .unwrap();

    let log = scheduler.run_job_now(OVERDUE_TASKS).await.unwrap();
    assert_eq!(log.job_name, OVERDUE_TASKS);
    assert_eq!(log.status, JobStatus::Completed);
    assert_eq!(log.items_processed, 1);

    assert!(matches!(
        scheduler.run_job_now("ticket_cleanup").await,
        Err(JobError::ConfigError(_))
    ));

    let logs = scheduler.get_execution_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, log.id);
    assert_eq!(harness.store.notifications.lock().unwrap().len(), 1);
}
