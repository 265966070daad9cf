// Background Jobs Service
//
// Scheduled jobs for the automation core, run by tokio-cron-scheduler.

pub mod overdue_tasks;
pub mod scheduler;

pub use overdue_tasks::{OverdueSweepResult, OverdueTaskSweep};
pub use scheduler::{JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus};
