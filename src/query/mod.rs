//! The query engine core: one [`Query`] per canonical resource key.
//!
//! A query owns the fetch state machine for its resource:
//!
//! ```text
//!             subscribe 0→1                 settle(success | failure)
//!   dormant ───────────────► observed+fetching ───────────────────────► observed
//!      ▲                        │  fetch(): cancel + restart                │
//!      │   grace window elapsed │                                          │ unsubscribe 1→0
//!      └────────────────────────┴──────────── teardown pending ◄───────────┘
//! ```
//!
//! Invariants:
//! - at most one transport request is in flight; starting one cancels the previous
//! - a cancelled request never touches `response` or `error`
//! - a failed request never clears `response`
//! - every in-flight request carries a generation number, completions from an
//!   older generation are discarded

mod fetch;
mod observe;
mod state;
mod wait;


use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub(crate) use state::QueryState;

use crate::Decoder;
use crate::EngineConfig;
use crate::Metadata;
use crate::QueryFailure;
use crate::QueryRequest;
use crate::Store;
use crate::Transport;

/// Payload types a query can hold
pub trait QueryData: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> QueryData for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Last successful result of a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse<T> {
    pub data: T,
    pub headers: Metadata,
    /// Wall clock time the response was produced, in ms since the Unix epoch
    pub timestamp_ms: u64,
}

/// Read-only view of a query's observed fields
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub response: Option<QueryResponse<T>>,
    pub error: Option<QueryFailure>,
    pub is_fetching: bool,
    pub is_started: bool,
    pub is_observed: bool,
    /// `response` was served from the store or predates a pending forced fetch
    pub is_stale: bool,
    /// The query was shut down; no further snapshot follows this one
    pub is_closed: bool,
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        Self {
            response: None,
            error: None,
            is_fetching: false,
            is_started: false,
            is_observed: false,
            is_stale: false,
            is_closed: false,
        }
    }
}

/// Collaborators shared by every query of one registry
pub(crate) struct EngineContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) config: EngineConfig,
    /// Parent of every request token; cancelled on registry shutdown
    pub(crate) shutdown: CancellationToken,
}

/// A single logical remote resource.
///
/// Obtain one from [`crate::QueryRegistry::get`]; equal keys share one instance.
/// All mutation happens inside the engine. Callers read through the accessors,
/// [`Query::watch`] or an [`crate::Observer`].
///
/// Methods that may start a request must be called from within a Tokio runtime.
pub struct Query<T: QueryData> {
    key: String,
    request: QueryRequest,
    decoder: Decoder<T>,
    ctx: Arc<EngineContext>,
    state: Mutex<QueryState<T>>,
    snapshot_tx: watch::Sender<QuerySnapshot<T>>,
}

impl<T: QueryData> fmt::Debug for Query<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("observer_count", &st.observer_count)
            .field("is_fetching", &st.is_fetching())
            .field("generation", &st.generation)
            .finish()
    }
}

impl<T: QueryData> Query<T> {
    pub(crate) fn new(
        key: String,
        request: QueryRequest,
        decoder: Decoder<T>,
        ctx: Arc<EngineContext>,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(QuerySnapshot::default());
        Arc::new(Self {
            key,
            request,
            decoder,
            ctx,
            state: Mutex::new(QueryState::default()),
            snapshot_tx,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn response(&self) -> Option<QueryResponse<T>> {
        self.state.lock().response.clone()
    }

    pub fn error(&self) -> Option<QueryFailure> {
        self.state.lock().error.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.state.lock().is_fetching()
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().is_started
    }

    pub fn is_observed(&self) -> bool {
        self.state.lock().is_observed
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().is_stale()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observer_count
    }

    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.state.lock().snapshot()
    }

    /// Receiver notified after every state change.
    ///
    /// Holding a receiver does not count as observing; use
    /// [`Query::observe`] to keep the query alive.
    pub fn watch(&self) -> watch::Receiver<QuerySnapshot<T>> {
        self.snapshot_tx.subscribe()
    }

    /// Publishes the current state. Called with the state lock held so
    /// snapshots are ordered like the mutations that produced them.
    fn publish(
        &self,
        st: &QueryState<T>,
    ) {
        self.snapshot_tx.send_replace(st.snapshot());
    }
}

/// Type-erased control surface used by the registry and observation scopes
pub(crate) trait ErasedQuery: Send + Sync {
    fn key(&self) -> &str;

    fn subscribe(&self);

    fn unsubscribe(&self);

    fn invalidate(&self);

    fn close(&self);

    /// Not observed, no pending teardown and nothing in flight
    fn is_dormant(&self) -> bool;
}

impl<T: QueryData> ErasedQuery for Arc<Query<T>> {
    fn key(&self) -> &str {
        Query::key(self)
    }

    fn subscribe(&self) {
        Query::subscribe(self)
    }

    fn unsubscribe(&self) {
        Query::unsubscribe(self)
    }

    fn invalidate(&self) {
        Query::invalidate(self)
    }

    fn close(&self) {
        Query::close(self)
    }

    fn is_dormant(&self) -> bool {
        self.state.lock().is_dormant()
    }
}
