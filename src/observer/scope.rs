use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::query::ErasedQuery;
use crate::Query;
use crate::QueryData;
use crate::QuerySnapshot;

/// Tracks which queries a reactive computation reads.
///
/// ```ignore
/// let mut scope = ObservationScope::new();
/// let label = scope.run(|reads| {
///     let balance = reads.read(&balance_query);
///     render(balance.response)
/// });
/// ```
///
/// Each [`ObservationScope::run`] (or `begin` / `read` / `commit` sequence)
/// replaces the previous set of observed queries. Newly read queries are
/// subscribed before stale ones are unsubscribed. Dropping the scope releases
/// everything it observes.
#[derive(Default)]
pub struct ObservationScope {
    active: HashMap<String, Box<dyn ErasedQuery>>,
    reads: HashMap<String, Box<dyn ErasedQuery>>,
}

impl ObservationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording a new run
    pub fn begin(&mut self) {
        self.reads.clear();
    }

    /// Records a read of `query` and returns its current snapshot
    pub fn read<T: QueryData>(
        &mut self,
        query: &Arc<Query<T>>,
    ) -> QuerySnapshot<T> {
        if !self.reads.contains_key(query.key()) {
            self.reads.insert(query.key().to_string(), Box::new(Arc::clone(query)));
        }
        query.snapshot()
    }

    /// Ends the run: subscribes new reads, unsubscribes queries not read this time
    pub fn commit(&mut self) {
        let reads = std::mem::take(&mut self.reads);
        let mut next = HashMap::with_capacity(reads.len());

        for (key, query) in reads {
            match self.active.remove(&key) {
                Some(existing) => {
                    next.insert(key, existing);
                }
                None => {
                    trace!(key = %key, "Scope started observing");
                    query.subscribe();
                    next.insert(key, query);
                }
            }
        }

        for (key, query) in std::mem::replace(&mut self.active, next) {
            trace!(key = %key, "Scope stopped observing");
            query.unsubscribe();
        }
    }

    /// Runs `compute` as one tracked run
    pub fn run<R>(
        &mut self,
        compute: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.begin();
        let result = compute(self);
        self.commit();
        result
    }

    /// Unsubscribes everything this scope observes
    pub fn clear(&mut self) {
        self.reads.clear();
        for (_, query) in self.active.drain() {
            query.unsubscribe();
        }
    }

    pub fn is_observing(
        &self,
        key: &str,
    ) -> bool {
        self.active.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        self.clear();
    }
}
