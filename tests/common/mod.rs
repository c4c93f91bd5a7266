use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use q_engine::EngineConfig;
use q_engine::QueryRegistry;
use q_engine::Store;
use q_engine::Transport;
use q_engine::TransportError;
use q_engine::TransportRequest;
use q_engine::TransportResponse;
use tokio_util::sync::CancellationToken;

pub const LATENCY_IN_MS: u64 = 100;
pub const DEBOUNCE_IN_MS: u64 = 20;

/// Remote counter: every completed request returns the next integer.
///
/// Requests take [`LATENCY_IN_MS`] and stop early when cancelled.
#[derive(Default)]
pub struct CounterTransport {
    next: AtomicU64,
    calls: AtomicUsize,
    cancellations: AtomicUsize,
}

impl CounterTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CounterTransport {
    async fn request(
        &self,
        _request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Aborted)
            }
            _ = tokio::time::sleep(Duration::from_millis(LATENCY_IN_MS)) => {
                let value = self.next.fetch_add(1, Ordering::SeqCst);
                Ok(TransportResponse::ok(value.to_string()))
            }
        }
    }
}

pub fn engine_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.observer.unsubscribe_debounce_ms = DEBOUNCE_IN_MS;
    config.transport.base_url = "https://node.example.com".to_string();
    config.validate().expect("test config should be valid")
}

pub fn registry(
    transport: Arc<CounterTransport>,
    store: Arc<dyn Store>,
) -> QueryRegistry {
    QueryRegistry::new(engine_config(), transport, store)
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
