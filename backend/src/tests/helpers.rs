use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use super::fakes::Harness;
use crate::workflows::WorkflowEngine;

static TRACING: Once = Once::new();

/// Route test logs through the libtest capture; `RUST_LOG` still applies.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

pub const TEST_ACTION_TIMEOUT: Duration = Duration::from_secs(2);

pub fn engine(harness: &Harness, max_chain_depth: usize) -> WorkflowEngine {
    init_tracing();
    WorkflowEngine::new(
        harness.store.clone(),
        harness.dispatcher(TEST_ACTION_TIMEOUT),
        max_chain_depth,
    )
}

pub fn shared_engine(harness: &Harness, max_chain_depth: usize) -> Arc<WorkflowEngine> {
    Arc::new(engine(harness, max_chain_depth))
}

/// Poll `check` until it holds or a second passes; for work done on
/// spawned tasks.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
