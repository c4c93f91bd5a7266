use std::sync::Arc;

use q_engine::QueryRequest;
use q_engine::SledStore;
use tempfile::tempdir;

use crate::common::registry;
use crate::common::sleep_ms;
use crate::common::CounterTransport;
use crate::common::LATENCY_IN_MS;

#[tokio::test(start_paused = true)]
async fn test_new_registry_shows_persisted_response_until_refetched() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SledStore::open(dir.path().join("responses")).unwrap());

    let first = registry(CounterTransport::new(), store.clone());
    let balance = first.get::<u64>(QueryRequest::get("/balance")).unwrap();
    assert_eq!(balance.wait_response().await.unwrap().map(|r| r.data), Some(0));
    // Persistence runs in the background
    sleep_ms(1).await;
    store.flush().await.unwrap();
    first.shutdown();

    let transport = CounterTransport::new();
    let second = registry(transport.clone(), store);
    let balance = second.get::<u64>(QueryRequest::get("/balance")).unwrap();

    let observer = balance.observe();
    sleep_ms(LATENCY_IN_MS / 2).await;
    let snapshot = observer.snapshot();
    assert_eq!(snapshot.response.map(|r| r.data), Some(0));
    assert!(snapshot.is_stale);
    assert!(snapshot.is_fetching);

    sleep_ms(LATENCY_IN_MS).await;
    let snapshot = observer.snapshot();
    assert_eq!(snapshot.response.map(|r| r.data), Some(0));
    assert!(!snapshot.is_stale);
    assert!(!snapshot.is_fetching);
    assert_eq!(transport.calls(), 1);
}
