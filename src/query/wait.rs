//! Wait coordinators.
//!
//! Both waits hold a private synthetic observer for their whole duration, so
//! unrelated observers coming and going never cancel the request they wait on.
//! Waiters are tied to fetch generations rather than to a particular request
//! object: a `fetch()` issued mid-wait is honoured and the waiter resolves with
//! whichever generation ultimately settles.

use std::sync::Arc;

use tracing::trace;

use super::Query;
use super::QueryData;
use super::QueryResponse;
use super::QueryState;
use crate::QueryError;
use crate::Result;

/// Observer registered on behalf of a waiter; released on drop
struct SyntheticObserver<T: QueryData> {
    query: Arc<Query<T>>,
}

impl<T: QueryData> Drop for SyntheticObserver<T> {
    fn drop(&mut self) {
        self.query.unsubscribe();
    }
}

impl<T: QueryData> Query<T> {
    /// Resolves with any non-stale response.
    ///
    /// Returns the current response immediately when it came from the network
    /// and no `fetch()`/`wait_fresh_response()` is outstanding. Otherwise keeps
    /// the query alive and fetching until a response or a failure of a request
    /// issued for this wait appears.
    ///
    /// Resolves `Ok(None)` only if the query is closed while waiting.
    ///
    /// # Errors
    /// [`QueryError::Failed`] when the awaited request fails. Cancellations and
    /// store failures never reject.
    pub async fn wait_response(self: &Arc<Self>) -> Result<Option<QueryResponse<T>>> {
        let mut rx = self.snapshot_tx.subscribe();

        let (_observer, baseline) = {
            let mut st = self.state.lock();
            if st.closed {
                return Ok(None);
            }
            if st.has_fresh_response() {
                return Ok(st.response.clone());
            }

            self.subscribe_locked(&mut st);
            let observer = SyntheticObserver {
                query: Arc::clone(self),
            };
            if st.in_flight.is_none() {
                self.start_fetch(&mut st, false);
            }
            let baseline = st.in_flight.as_ref().map_or(st.generation, |f| f.generation);
            self.publish(&st);
            (observer, baseline)
        };
        trace!(key = %self.key, baseline, "Waiting for response");

        loop {
            let ready = {
                let mut st = self.state.lock();
                self.poll_response(&mut st, baseline)
            };
            if let Some(result) = ready {
                return result;
            }
            // `self` owns the sender; closing publishes a snapshot polled above
            let _ = rx.changed().await;
        }
    }

    /// Resolves with a response produced by a request issued for this call.
    ///
    /// Forces a new fetch unless a forced fetch is already in flight, in which
    /// case the call shares it. Concurrent callers therefore share one
    /// transport request and each resolves with its outcome.
    ///
    /// # Errors
    /// [`QueryError::Failed`] when the awaited request fails,
    /// [`QueryError::Closed`] when the query is closed while waiting.
    pub async fn wait_fresh_response(self: &Arc<Self>) -> Result<QueryResponse<T>> {
        let mut rx = self.snapshot_tx.subscribe();

        let (_observer, mut target) = {
            let mut st = self.state.lock();
            if st.closed {
                return Err(self.closed_error());
            }

            // Start (or join) the forced fetch before registering the observer,
            // so the 0→1 transition does not issue a request of its own.
            let joinable = st.in_flight.as_ref().filter(|f| f.forced).map(|f| f.generation);
            let target = match joinable {
                Some(generation) => generation,
                None => self.start_fetch(&mut st, true),
            };
            self.subscribe_locked(&mut st);
            let observer = SyntheticObserver {
                query: Arc::clone(self),
            };
            self.publish(&st);
            (observer, target)
        };
        trace!(key = %self.key, target, "Waiting for fresh response");

        loop {
            let ready = {
                let mut st = self.state.lock();
                self.poll_fresh_response(&mut st, &mut target)
            };
            if let Some(result) = ready {
                return result;
            }
            let _ = rx.changed().await;
        }
    }

    fn poll_response(
        self: &Arc<Self>,
        st: &mut QueryState<T>,
        baseline: u64,
    ) -> Option<Result<Option<QueryResponse<T>>>> {
        if st.closed {
            return Some(Ok(None));
        }
        if st.has_fresh_response() {
            return Some(Ok(st.response.clone()));
        }
        if st.in_flight.is_some() {
            return None;
        }
        if st.error_generation >= baseline {
            if let Some(failure) = &st.error {
                return Some(Err(QueryError::Failed(failure.clone()).into()));
            }
        }
        // Settled without anything usable, e.g. invalidated mid-wait
        self.start_fetch(st, false);
        self.publish(st);
        None
    }

    fn poll_fresh_response(
        self: &Arc<Self>,
        st: &mut QueryState<T>,
        target: &mut u64,
    ) -> Option<Result<QueryResponse<T>>> {
        if st.closed {
            return Some(Err(self.closed_error()));
        }
        if st.response_generation >= *target {
            if let Some(response) = &st.response {
                return Some(Ok(response.clone()));
            }
        }
        if st.in_flight.is_some() {
            return None;
        }
        if st.error_generation >= *target {
            if let Some(failure) = &st.error {
                return Some(Err(QueryError::Failed(failure.clone()).into()));
            }
        }
        *target = self.start_fetch(st, true);
        self.publish(st);
        None
    }

    fn closed_error(&self) -> crate::Error {
        QueryError::Closed {
            key: self.key.clone(),
        }
        .into()
    }
}
