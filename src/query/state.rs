use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::QueryResponse;
use super::QuerySnapshot;
use crate::QueryFailure;

/// The request currently owned by a query
pub(crate) struct InFlight {
    pub(crate) generation: u64,
    /// Started by `fetch()`/`wait_fresh_response()` rather than by observation
    pub(crate) forced: bool,
    pub(crate) token: CancellationToken,
}

/// Debounced teardown scheduled when the last observer left
pub(crate) struct PendingTeardown {
    pub(crate) epoch: u64,
    pub(crate) token: CancellationToken,
}

pub(crate) struct QueryState<T> {
    pub(crate) response: Option<QueryResponse<T>>,
    /// Generation that produced `response`; 0 when hydrated from the store
    pub(crate) response_generation: u64,
    /// When the current network response arrived, for `stale_time`
    pub(crate) fetched_at: Option<Instant>,

    pub(crate) error: Option<QueryFailure>,
    pub(crate) error_generation: u64,

    pub(crate) observer_count: usize,
    pub(crate) is_observed: bool,
    pub(crate) is_started: bool,

    pub(crate) in_flight: Option<InFlight>,
    /// Last generation handed out; generations start at 1
    pub(crate) generation: u64,
    /// Generation of a forced fetch that has not settled yet
    pub(crate) forced_pending: Option<u64>,

    pub(crate) teardown: Option<PendingTeardown>,
    pub(crate) teardown_epoch: u64,

    pub(crate) hydration_requested: bool,
    /// A request settled with a success or a failure; persisted data is older
    pub(crate) network_settled: bool,
    pub(crate) closed: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            response: None,
            response_generation: 0,
            fetched_at: None,
            error: None,
            error_generation: 0,
            observer_count: 0,
            is_observed: false,
            is_started: false,
            in_flight: None,
            generation: 0,
            forced_pending: None,
            teardown: None,
            teardown_epoch: 0,
            hydration_requested: false,
            network_settled: false,
            closed: false,
        }
    }
}

impl<T: Clone> QueryState<T> {
    pub(crate) fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A network response exists and no forced fetch is outstanding
    pub(crate) fn has_fresh_response(&self) -> bool {
        self.response.is_some() && self.response_generation > 0 && self.forced_pending.is_none()
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.response.is_some() && !self.has_fresh_response()
    }

    /// Whether a new observer can use the current response without a refetch
    pub(crate) fn satisfies_new_observer(
        &self,
        stale_time: Duration,
    ) -> bool {
        self.has_fresh_response()
            && self.fetched_at.map_or(false, |at| at.elapsed() < stale_time)
    }

    pub(crate) fn is_dormant(&self) -> bool {
        self.observer_count == 0 && self.teardown.is_none() && self.in_flight.is_none()
    }

    /// Clears `forced_pending` once `generation` (or a later one) settled
    pub(crate) fn settle_forced(
        &mut self,
        generation: u64,
    ) {
        if self.forced_pending.map_or(false, |pending| pending <= generation) {
            self.forced_pending = None;
        }
    }

    pub(crate) fn snapshot(&self) -> QuerySnapshot<T> {
        QuerySnapshot {
            response: self.response.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching(),
            is_started: self.is_started,
            is_observed: self.is_observed,
            is_stale: self.is_stale(),
            is_closed: self.closed,
        }
    }
}
