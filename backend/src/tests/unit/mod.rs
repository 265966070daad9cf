mod bulk_messaging;
mod overdue_sweep;
mod scoring_pipeline;
mod workflow_engine;
