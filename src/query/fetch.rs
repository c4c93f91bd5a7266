//! Fetch execution, persistence and hydration.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::state::InFlight;
use super::Query;
use super::QueryData;
use super::QueryResponse;
use super::QueryState;
use crate::constants::TIMEOUT_FAILURE_MESSAGE;
use crate::metrics;
use crate::utils::time::timestamp_millis;
use crate::QueryFailure;
use crate::StoredResponse;
use crate::TransportError;
use crate::TransportRequest;
use crate::TransportResponse;

/// How a request ended, as seen by the engine
pub(crate) enum FetchOutcome<T> {
    Success(QueryResponse<T>),
    Failed(QueryFailure),
    /// The request token fired; never a failure
    Cancelled,
}

impl<T: QueryData> Query<T> {
    /// Starts a new request, cancelling the one in flight first.
    ///
    /// This always forces a network round-trip regardless of freshness.
    pub fn fetch(self: &Arc<Self>) {
        let mut st = self.state.lock();
        if st.closed {
            trace!(key = %self.key, "Ignoring fetch on closed query");
            return;
        }
        self.start_fetch(&mut st, true);
        self.publish(&st);
    }

    /// Drops the cached response and error.
    ///
    /// An observed query immediately refetches; a dormant one fetches on its
    /// next observation.
    pub fn invalidate(self: &Arc<Self>) {
        let mut st = self.state.lock();
        if st.closed {
            return;
        }
        debug!(key = %self.key, "Invalidating query");
        st.response = None;
        st.response_generation = 0;
        st.fetched_at = None;
        st.error = None;
        if st.observer_count > 0 {
            self.start_fetch(&mut st, true);
        }
        self.publish(&st);
    }

    /// Cancels any in-flight request and rejects further work.
    pub(crate) fn close(&self) {
        let mut st = self.state.lock();
        if st.closed {
            return;
        }
        st.closed = true;
        if let Some(in_flight) = st.in_flight.take() {
            in_flight.token.cancel();
            metrics::record_fetch(metrics::OUTCOME_CANCELLED);
        }
        if let Some(teardown) = st.teardown.take() {
            teardown.token.cancel();
        }
        st.forced_pending = None;
        st.is_observed = false;
        st.is_started = false;
        debug!(key = %self.key, "Query closed");
        self.publish(&st);
    }

    /// Cancel-then-start. Returns the generation of the new request.
    pub(super) fn start_fetch(
        self: &Arc<Self>,
        st: &mut QueryState<T>,
        forced: bool,
    ) -> u64 {
        if let Some(previous) = st.in_flight.take() {
            previous.token.cancel();
            metrics::record_fetch(metrics::OUTCOME_SUPERSEDED);
            trace!(
                key = %self.key,
                generation = previous.generation,
                "Superseded in-flight fetch"
            );
        }

        st.generation += 1;
        let generation = st.generation;
        let token = self.ctx.shutdown.child_token();
        st.in_flight = Some(InFlight {
            generation,
            forced,
            token: token.clone(),
        });
        if forced {
            st.forced_pending = Some(generation);
        }

        metrics::record_fetch(metrics::OUTCOME_STARTED);
        debug!(key = %self.key, generation, forced, "Starting fetch");

        let query = Arc::clone(self);
        tokio::spawn(async move {
            query.run_fetch(generation, token).await;
        });
        generation
    }

    async fn run_fetch(
        self: Arc<Self>,
        generation: u64,
        token: CancellationToken,
    ) {
        let request = TransportRequest::compose(&self.ctx.config.transport, &self.request);
        let call = self.ctx.transport.request(request, token.clone());

        let result = match self.ctx.config.transport.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) if !token.is_cancelled() => {
                    token.cancel();
                    debug!(key = %self.key, generation, ?limit, "Fetch timed out");
                    self.settle(
                        generation,
                        FetchOutcome::Failed(QueryFailure::new(TIMEOUT_FAILURE_MESSAGE)),
                    );
                    return;
                }
                Err(_) => Err(TransportError::Timeout(limit)),
            },
            None => call.await,
        };

        // Cancellation is read from the token, whatever the transport returned
        let outcome = if token.is_cancelled() {
            FetchOutcome::Cancelled
        } else {
            self.classify(result)
        };
        self.settle(generation, outcome);
    }

    fn classify(
        &self,
        result: std::result::Result<TransportResponse, TransportError>,
    ) -> FetchOutcome<T> {
        match result {
            Ok(response) if response.is_success() => match (self.decoder)(&response) {
                Ok(data) => FetchOutcome::Success(QueryResponse {
                    data,
                    headers: response.headers,
                    timestamp_ms: timestamp_millis(),
                }),
                Err(message) => FetchOutcome::Failed(QueryFailure::new(message)),
            },
            Ok(response) => FetchOutcome::Failed(response.status_failure()),
            Err(e) => FetchOutcome::Failed(QueryFailure::new(e.to_string())),
        }
    }

    /// Applies the outcome of `generation` if it still owns the query.
    pub(super) fn settle(
        self: &Arc<Self>,
        generation: u64,
        outcome: FetchOutcome<T>,
    ) {
        let mut st = self.state.lock();
        let current = st.in_flight.as_ref().map_or(false, |f| f.generation == generation);
        if !current {
            trace!(key = %self.key, generation, "Discarding completion of a replaced fetch");
            return;
        }
        st.in_flight = None;

        let mut to_persist = None;
        match outcome {
            FetchOutcome::Success(response) => {
                metrics::record_fetch(metrics::OUTCOME_SUCCEEDED);
                debug!(key = %self.key, generation, "Fetch succeeded");
                if self.ctx.config.cache.persist {
                    to_persist = Some(StoredResponse::from(&response));
                }
                st.response = Some(response);
                st.response_generation = generation;
                st.fetched_at = Some(Instant::now());
                st.network_settled = true;
                st.error = None;
                st.settle_forced(generation);
            }
            FetchOutcome::Failed(failure) => {
                metrics::record_fetch(metrics::OUTCOME_FAILED);
                debug!(key = %self.key, generation, error = %failure, "Fetch failed");
                st.error = Some(failure);
                st.error_generation = generation;
                st.network_settled = true;
                st.settle_forced(generation);
            }
            FetchOutcome::Cancelled => {
                // Only the shutdown token can cancel a request that still owns the query
                trace!(key = %self.key, generation, "Fetch cancelled");
            }
        }
        self.publish(&st);
        drop(st);

        if let Some(stored) = to_persist {
            self.persist(stored);
        }
    }

    /// Fire-and-forget write of the latest response
    fn persist(
        &self,
        stored: StoredResponse<T>,
    ) {
        let bytes = match stored.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                metrics::record_store_error(metrics::STORE_OP_SET);
                warn!(key = %self.key, "Failed to encode response for the store: {}", e);
                return;
            }
        };
        let store = Arc::clone(&self.ctx.store);
        let store_key = self.ctx.config.cache.store_key(&self.key);
        tokio::spawn(async move {
            if let Err(e) = store.set(&store_key, bytes).await {
                metrics::record_store_error(metrics::STORE_OP_SET);
                warn!(key = %store_key, "Failed to persist response: {}", e);
            }
        });
    }

    /// Loads the persisted response, unless a response already exists or a
    /// request has settled since the query was created.
    ///
    /// A hydrated response is stale: it is shown, but it never satisfies
    /// `wait_response`. Returns whether a persisted response was applied.
    pub async fn hydrate(&self) -> bool {
        let store_key = self.ctx.config.cache.store_key(&self.key);
        let bytes = match self.ctx.store.get(&store_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(e) => {
                metrics::record_store_error(metrics::STORE_OP_GET);
                warn!(key = %store_key, "Failed to read persisted response: {}", e);
                return false;
            }
        };
        let stored = match StoredResponse::<T>::decode(&bytes) {
            Ok(stored) => stored,
            Err(e) => {
                metrics::record_store_error(metrics::STORE_OP_DECODE);
                warn!(key = %store_key, "Discarding undecodable persisted response: {}", e);
                return false;
            }
        };

        let mut st = self.state.lock();
        // Anything the network produced meanwhile, even if since invalidated, is newer
        if st.closed || st.response.is_some() || st.network_settled {
            return false;
        }
        debug!(key = %self.key, "Hydrated response from store");
        st.response = Some(stored.into());
        st.response_generation = 0;
        self.publish(&st);
        true
    }

    /// Hydration runs at most once per query lifetime, on first observation
    pub(super) fn spawn_hydration(
        self: &Arc<Self>,
        st: &mut QueryState<T>,
    ) {
        if st.hydration_requested || !self.ctx.config.cache.hydrate {
            return;
        }
        st.hydration_requested = true;
        let query = Arc::clone(self);
        tokio::spawn(async move {
            query.hydrate().await;
        });
    }
}
