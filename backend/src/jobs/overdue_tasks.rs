// Overdue Task Sweep - Flags past-due tasks and fires `task_overdue` workflows

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::JobResult;
use crate::repositories::TaskStore;
use crate::workflows::{TriggerEvent, WorkflowEngine};

#[derive(Debug, Default)]
pub struct OverdueSweepResult {
    pub tasks_found: i32,
    pub triggers_fired: i32,
    pub actions_failed: i32,
    pub errors: Vec<String>,
}

pub struct OverdueTaskSweep {
    tasks: Arc<dyn TaskStore>,
    engine: Arc<WorkflowEngine>,
}

impl OverdueTaskSweep {
    pub fn new(tasks: Arc<dyn TaskStore>, engine: Arc<WorkflowEngine>) -> Self {
        Self { tasks, engine }
    }

    /// Each task is flagged before its trigger runs, so a crash mid-sweep
    /// never notifies the same task twice.
    pub async fn run(&self) -> JobResult<OverdueSweepResult> {
        let mut result = OverdueSweepResult::default();

        let overdue = self.tasks.overdue_tasks(Utc::now()).await?;
        result.tasks_found = overdue.len() as i32;

        for task in overdue {
            if let Err(e) = self.tasks.mark_overdue_notified(task.id).await {
                warn!("Could not flag task {} as overdue: {}", task.id, e);
                result.errors.push(format!("task {}: {}", task.id, e));
                continue;
            }

            let event = TriggerEvent::task_overdue(&task);
            match self.engine.process_cascade(event.trigger_type, event.payload).await {
                Ok(cascade) => {
                    result.triggers_fired += 1;
                    result.actions_failed += cascade.failed() as i32;
                }
                Err(e) => {
                    error!("task_overdue dispatch for {} failed: {}", task.id, e);
                    result.errors.push(format!("task {}: {}", task.id, e));
                }
            }
        }

        info!(
            "Overdue sweep: {} tasks found, {} triggers fired",
            result.tasks_found, result.triggers_fired
        );
        Ok(result)
    }
}
