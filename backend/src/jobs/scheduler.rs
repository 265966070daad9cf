// Job Scheduler - Cron-driven score recalculation and overdue task sweeps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{error, info};
use uuid::Uuid;

use super::OverdueTaskSweep;
use crate::config::ScheduleConfig;
use crate::repositories::{StoreError, TaskStore};
use crate::scoring::{LeadScoringService, ScoringError};
use crate::workflows::WorkflowEngine;

const MAX_EXECUTION_LOGS: usize = 100;

pub const SCORE_RECALCULATION: &str = "score_recalculation";
pub const OVERDUE_TASKS: &str = "overdue_tasks";

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Job execution error: {0}")]
    ExecutionError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ScoringError> for JobError {
    fn from(err: ScoringError) -> Self {
        Self::ExecutionError(err.to_string())
    }
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub items_processed: i32,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    PartialFailure,
}

/// Last `MAX_EXECUTION_LOGS` runs, oldest first
#[derive(Clone, Default)]
pub struct ExecutionLogRing {
    logs: Arc<RwLock<Vec<JobExecutionLog>>>,
}

impl ExecutionLogRing {
    pub async fn push(&self, log: JobExecutionLog) {
        let mut logs = self.logs.write().await;
        logs.push(log);
        if logs.len() > MAX_EXECUTION_LOGS {
            let excess = logs.len() - MAX_EXECUTION_LOGS;
            logs.drain(..excess);
        }
    }

    pub async fn snapshot(&self) -> Vec<JobExecutionLog> {
        self.logs.read().await.clone()
    }
}

/// Everything a job run needs, cheap to clone into cron closures
#[derive(Clone)]
struct JobContext {
    scoring: Arc<LeadScoringService>,
    engine: Arc<WorkflowEngine>,
    tasks: Arc<dyn TaskStore>,
    logs: ExecutionLogRing,
}

impl JobContext {
    async fn run(&self, job_name: &str) -> JobResult<JobExecutionLog> {
        let started_at = Utc::now();
        info!("Running {} job", job_name);

        let outcome = match job_name {
            SCORE_RECALCULATION => self
                .scoring
                .bulk_calculate_scores()
                .await
                .map(|report| {
                    let errors = report
                        .errors
                        .into_iter()
                        .map(|f| format!("lead {}: {}", f.lead_id, f.error))
                        .collect();
                    (report.succeeded as i32, errors)
                })
                .map_err(JobError::from),
            OVERDUE_TASKS => OverdueTaskSweep::new(self.tasks.clone(), self.engine.clone())
                .run()
                .await
                .map(|result| (result.triggers_fired, result.errors)),
            other => return Err(JobError::ConfigError(format!("Unknown job: {}", other))),
        };

        let completed_at = Utc::now();
        let log = match outcome {
            Ok((items_processed, errors)) => JobExecutionLog {
                id: Uuid::new_v4(),
                job_name: job_name.to_string(),
                started_at,
                completed_at: Some(completed_at),
                status: if errors.is_empty() {
                    JobStatus::Completed
                } else {
                    JobStatus::PartialFailure
                },
                items_processed,
                errors,
                duration_ms: Some((completed_at - started_at).num_milliseconds()),
            },
            Err(e) => {
                error!("{} job failed: {}", job_name, e);
                JobExecutionLog {
                    id: Uuid::new_v4(),
                    job_name: job_name.to_string(),
                    started_at,
                    completed_at: Some(completed_at),
                    status: JobStatus::Failed,
                    items_processed: 0,
                    errors: vec![e.to_string()],
                    duration_ms: Some((completed_at - started_at).num_milliseconds()),
                }
            }
        };

        info!(
            "{} job finished: {:?}, {} items, {} errors",
            job_name,
            log.status,
            log.items_processed,
            log.errors.len()
        );
        self.logs.push(log.clone()).await;
        Ok(log)
    }
}

pub struct JobScheduler {
    scheduler: TokioScheduler,
    context: JobContext,
    config: ScheduleConfig,
}

impl JobScheduler {
    pub async fn new(
        scoring: Arc<LeadScoringService>,
        engine: Arc<WorkflowEngine>,
        tasks: Arc<dyn TaskStore>,
        config: ScheduleConfig,
    ) -> JobResult<Self> {
        let scheduler = TokioScheduler::new().await?;

        Ok(Self {
            scheduler,
            context: JobContext {
                scoring,
                engine,
                tasks,
                logs: ExecutionLogRing::default(),
            },
            config,
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!("Starting background job scheduler");

        self.schedule(SCORE_RECALCULATION, &self.config.score_recalc_cron).await?;
        self.schedule(OVERDUE_TASKS, &self.config.task_overdue_cron).await?;

        self.scheduler.start().await?;

        info!("Background job scheduler started successfully");
        Ok(())
    }

    pub async fn shutdown(&self) -> JobResult<()> {
        info!("Shutting down background job scheduler");
        // The cron handle is shared; shutting down a clone stops every copy
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn schedule(&self, job_name: &'static str, cron_expr: &str) -> JobResult<()> {
        let context = self.context.clone();

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let context = context.clone();
            Box::pin(async move {
                if let Err(e) = context.run(job_name).await {
                    error!("{} job could not run: {}", job_name, e);
                }
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled {} with cron '{}'", job_name, cron_expr);

        Ok(())
    }

    /// Most recent runs, oldest first.
    pub async fn get_execution_logs(&self) -> Vec<JobExecutionLog> {
        self.context.logs.snapshot().await
    }

    /// Run a job outside its schedule; the run is logged like a cron run.
    pub async fn run_job_now(&self, job_name: &str) -> JobResult<JobExecutionLog> {
        self.context.run(job_name).await
    }
}
