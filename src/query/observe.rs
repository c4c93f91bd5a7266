//! Observer reference counting with debounced teardown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::state::PendingTeardown;
use super::Query;
use super::QueryData;
use super::QueryState;
use crate::metrics;

impl<T: QueryData> Query<T> {
    /// Registers one observer.
    ///
    /// On the 0→1 transition the query becomes observed and started and, unless
    /// a fresh-enough response or a request in flight already covers it, starts
    /// a fetch. A subscribe inside the grace window of a previous
    /// unsubscribe only cancels the pending teardown.
    pub fn subscribe(self: &Arc<Self>) {
        let mut st = self.state.lock();
        self.subscribe_locked(&mut st);
    }

    /// Unregisters one observer.
    ///
    /// On the 1→0 transition the teardown is deferred by the configured grace
    /// window; only then is the in-flight request cancelled. Cancellation never
    /// records an error and never clears the response.
    pub fn unsubscribe(self: &Arc<Self>) {
        let mut st = self.state.lock();
        if st.observer_count == 0 {
            warn!(key = %self.key, "Unsubscribe without a matching subscribe");
            return;
        }
        st.observer_count -= 1;
        if st.observer_count > 0 {
            return;
        }
        if st.closed {
            return;
        }

        st.teardown_epoch += 1;
        let epoch = st.teardown_epoch;
        let token = CancellationToken::new();
        st.teardown = Some(PendingTeardown {
            epoch,
            token: token.clone(),
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delay = self.ctx.config.observer.unsubscribe_debounce();
                let query = Arc::clone(self);
                trace!(key = %self.key, ?delay, "Scheduling teardown");
                handle.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => query.finish_teardown(epoch),
                    }
                });
            }
            Err(_) => {
                // No runtime to wait on (e.g. dropped during shutdown): tear down now
                st.teardown = None;
                self.teardown_locked(&mut st);
                self.publish(&st);
            }
        }
    }

    pub(super) fn subscribe_locked(
        self: &Arc<Self>,
        st: &mut QueryState<T>,
    ) {
        st.observer_count += 1;
        if st.observer_count > 1 {
            return;
        }
        if let Some(pending) = st.teardown.take() {
            pending.token.cancel();
            trace!(key = %self.key, "Resubscribed within grace window");
            return;
        }
        if st.closed {
            return;
        }

        st.is_observed = true;
        st.is_started = true;
        debug!(key = %self.key, "Query observed");

        self.spawn_hydration(st);
        let stale_time = self.ctx.config.cache.stale_time();
        if st.in_flight.is_none() && !st.satisfies_new_observer(stale_time) {
            self.start_fetch(st, false);
        }
        self.publish(st);
    }

    fn finish_teardown(
        &self,
        epoch: u64,
    ) {
        let mut st = self.state.lock();
        let ours = st.teardown.as_ref().map_or(false, |t| t.epoch == epoch);
        if !ours || st.observer_count > 0 {
            return;
        }
        st.teardown = None;
        self.teardown_locked(&mut st);
        self.publish(&st);
    }

    fn teardown_locked(
        &self,
        st: &mut QueryState<T>,
    ) {
        if let Some(in_flight) = st.in_flight.take() {
            in_flight.token.cancel();
            metrics::record_fetch(metrics::OUTCOME_CANCELLED);
            debug!(
                key = %self.key,
                generation = in_flight.generation,
                "Cancelled fetch of unobserved query"
            );
        }
        st.forced_pending = None;
        st.is_observed = false;
        st.is_started = false;
        debug!(key = %self.key, "Query torn down");
    }
}
