use std::sync::Arc;
use std::time::Duration;

use crate::EngineConfig;
use crate::MemoryStore;
use crate::Query;
use crate::QueryRegistry;
use crate::QueryRequest;
use crate::Store;
use crate::Transport;

pub(crate) const TEST_DEBOUNCE_MS: u64 = 10;

pub(crate) fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.observer.unsubscribe_debounce_ms = TEST_DEBOUNCE_MS;
    config.transport.request_timeout_ms = 0;
    config
}

pub(crate) fn test_registry(transport: Arc<dyn Transport>) -> QueryRegistry {
    QueryRegistry::new(test_config(), transport, Arc::new(MemoryStore::new()))
}

pub(crate) fn test_registry_with_store(
    transport: Arc<dyn Transport>,
    store: Arc<dyn Store>,
) -> QueryRegistry {
    QueryRegistry::new(test_config(), transport, store)
}

pub(crate) fn counter_query(
    registry: &QueryRegistry,
    path: &str,
) -> Arc<Query<u64>> {
    registry.get::<u64>(QueryRequest::get(path)).expect("query should be created")
}

/// Lets every ready task run. With a paused clock the runtime only advances
/// time once all tasks are idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Sleeps past the unsubscribe grace window
pub(crate) async fn past_grace_window() {
    tokio::time::sleep(Duration::from_millis(TEST_DEBOUNCE_MS * 3)).await;
}
