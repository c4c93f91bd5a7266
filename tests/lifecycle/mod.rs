use std::sync::Arc;

use futures::future::join_all;
use q_engine::MemoryStore;
use q_engine::ObservationScope;
use q_engine::QueryRequest;
use tracing_test::traced_test;

use crate::common::registry;
use crate::common::sleep_ms;
use crate::common::CounterTransport;
use crate::common::DEBOUNCE_IN_MS;
use crate::common::LATENCY_IN_MS;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_waits_follow_fetch_order_without_cancellations() {
    let transport = CounterTransport::new();
    let registry = registry(transport.clone(), Arc::new(MemoryStore::new()));
    let balance = registry
        .get::<u64>(QueryRequest::get("/balance").with_param("address", "0xabc"))
        .unwrap();

    assert_eq!(balance.wait_response().await.unwrap().map(|r| r.data), Some(0));
    assert_eq!(balance.wait_fresh_response().await.unwrap().data, 1);
    assert_eq!(balance.wait_response().await.unwrap().map(|r| r.data), Some(1));
    assert_eq!(balance.wait_fresh_response().await.unwrap().data, 2);

    sleep_ms(DEBOUNCE_IN_MS * 2).await;
    assert_eq!(transport.calls(), 3);
    assert_eq!(transport.cancellations(), 0);
    assert!(balance.error().is_none());
    assert!(!balance.is_observed());
}

#[tokio::test(start_paused = true)]
async fn test_many_observers_share_one_request() {
    let transport = CounterTransport::new();
    let registry = registry(transport.clone(), Arc::new(MemoryStore::new()));

    let observers: Vec<_> = (0..8)
        .map(|_| {
            registry
                .get::<u64>(QueryRequest::get("/balance"))
                .unwrap()
                .observe()
        })
        .collect();
    let balance = observers[0].query().clone();

    let waits = join_all((0..4).map(|_| {
        let balance = balance.clone();
        async move { balance.wait_response().await }
    }))
    .await;

    for result in waits {
        assert_eq!(result.unwrap().map(|r| r.data), Some(0));
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(balance.observer_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_component_churn_keeps_request_alive() {
    let transport = CounterTransport::new();
    let registry = registry(transport.clone(), Arc::new(MemoryStore::new()));
    let balance = registry.get::<u64>(QueryRequest::get("/balance")).unwrap();
    let nonce = registry.get::<u64>(QueryRequest::get("/nonce")).unwrap();

    let mut scope = ObservationScope::new();
    scope.run(|reads| {
        reads.read(&balance);
    });
    sleep_ms(LATENCY_IN_MS / 4).await;

    // Two quick re-renders switching between screens
    scope.run(|reads| {
        reads.read(&nonce);
    });
    scope.run(|reads| {
        reads.read(&balance);
        reads.read(&nonce);
    });
    sleep_ms(LATENCY_IN_MS * 2).await;

    assert_eq!(transport.cancellations(), 0);
    assert_eq!(transport.calls(), 2);
    assert!(balance.response().is_some());
    assert!(nonce.response().is_some());

    drop(scope);
    sleep_ms(DEBOUNCE_IN_MS * 2).await;
    assert!(!balance.is_observed());
    assert!(!nonce.is_observed());
}

#[tokio::test(start_paused = true)]
async fn test_leaving_screen_cancels_request_and_keeps_response() {
    let transport = CounterTransport::new();
    let registry = registry(transport.clone(), Arc::new(MemoryStore::new()));
    let balance = registry.get::<u64>(QueryRequest::get("/balance")).unwrap();

    let observer = balance.observe();
    sleep_ms(LATENCY_IN_MS * 2).await;
    balance.fetch();
    sleep_ms(LATENCY_IN_MS / 2).await;
    drop(observer);
    sleep_ms(DEBOUNCE_IN_MS * 2).await;

    assert_eq!(transport.cancellations(), 1);
    assert!(!balance.is_fetching());
    assert!(!balance.is_observed());
    assert!(balance.error().is_none());
    assert_eq!(balance.response().map(|r| r.data), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_while_waiting_resolves_with_new_request() {
    let transport = CounterTransport::new();
    let registry = registry(transport.clone(), Arc::new(MemoryStore::new()));
    let balance = registry.get::<u64>(QueryRequest::get("/balance")).unwrap();

    let waiter = {
        let balance = balance.clone();
        tokio::spawn(async move { balance.wait_response().await })
    };
    sleep_ms(LATENCY_IN_MS / 2).await;
    balance.fetch();

    let response = waiter.await.unwrap().unwrap();
    // The first request never completed, so the new one produced the first value
    assert_eq!(response.map(|r| r.data), Some(0));
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.cancellations(), 1);
    assert!(balance.error().is_none());
}
