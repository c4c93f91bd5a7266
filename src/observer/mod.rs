//! Observation Bridge.
//!
//! Connects reads of a query's observed fields to observer registration:
//!
//! - [`Observer`]: an explicit handle. Creating it subscribes, dropping it
//!   unsubscribes.
//! - [`ObservationScope`]: implicit tracking for reactive computations. Every
//!   query read during a run is subscribed; queries no longer read when the
//!   next run commits are unsubscribed.
//!
//! Unsubscription to zero is debounced by the query itself, so re-render churn
//! between two runs never cancels a request.

mod scope;
pub use scope::*;


use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::Query;
use crate::QueryData;
use crate::QueryFailure;
use crate::QueryResponse;
use crate::QuerySnapshot;

/// Handle holding one observer registration on a query
///
/// When dropped, the observer is automatically unregistered from the query.
pub struct Observer<T: QueryData> {
    query: Arc<Query<T>>,
    receiver: watch::Receiver<QuerySnapshot<T>>,
}

impl<T: QueryData> Query<T> {
    /// Subscribes and returns a handle that unsubscribes on drop
    pub fn observe(self: &Arc<Self>) -> Observer<T> {
        let receiver = self.watch();
        self.subscribe();
        Observer {
            query: Arc::clone(self),
            receiver,
        }
    }
}

impl<T: QueryData> Observer<T> {
    pub fn query(&self) -> &Arc<Query<T>> {
        &self.query
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.receiver.borrow().clone()
    }

    pub fn response(&self) -> Option<QueryResponse<T>> {
        self.receiver.borrow().response.clone()
    }

    pub fn error(&self) -> Option<QueryFailure> {
        self.receiver.borrow().error.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.receiver.borrow().is_fetching
    }

    /// Waits for the next state change and returns the new snapshot.
    ///
    /// The snapshot of a closed query is delivered once; after that this
    /// returns `None`.
    pub async fn changed(&mut self) -> Option<QuerySnapshot<T>> {
        if !self.receiver.has_changed().ok()? && self.receiver.borrow().is_closed {
            return None;
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl<T: QueryData> fmt::Debug for Observer<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Observer").field("key", &self.query.key()).finish()
    }
}

impl<T: QueryData> Drop for Observer<T> {
    fn drop(&mut self) {
        self.query.unsubscribe();
    }
}
