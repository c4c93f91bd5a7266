//! Query Registry: exactly one [`Query`] per canonical key.
//!
//! The registry owns the collaborators every query shares (transport, store,
//! configuration) and a root cancellation token. It is an explicit value owned
//! by the application; there is no process-global registry.


use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::json_decoder;
use crate::metrics;
use crate::query::EngineContext;
use crate::query::ErasedQuery;
use crate::Decoder;
use crate::EngineConfig;
use crate::MemoryStore;
use crate::Query;
use crate::QueryData;
use crate::QueryError;
use crate::QueryRequest;
use crate::Result;
use crate::Store;
use crate::Transport;

struct RegistryEntry {
    /// `Arc<Query<T>>` for the payload type the key was created with
    typed: Arc<dyn Any + Send + Sync>,
    control: Box<dyn ErasedQuery>,
}

pub struct QueryRegistry {
    ctx: Arc<EngineContext>,
    queries: DashMap<String, RegistryEntry>,
}

impl fmt::Debug for QueryRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("queries", &self.queries.len())
            .field("config", &self.ctx.config)
            .finish()
    }
}

impl QueryRegistry {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn Store>,
    ) -> Self {
        metrics::ensure_registered();
        Self {
            ctx: Arc::new(EngineContext {
                transport,
                store,
                config,
                shutdown: CancellationToken::new(),
            }),
            queries: DashMap::new(),
        }
    }

    /// Registry persisting responses in process memory only
    pub fn with_memory_store(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(config, transport, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Returns the query for `request`, creating it on first reference.
    ///
    /// Responses are decoded as JSON. Creating a query performs no I/O.
    ///
    /// # Errors
    /// [`QueryError::TypeMismatch`] if the key was first requested with a
    /// different payload type.
    pub fn get<T: QueryData>(
        &self,
        request: QueryRequest,
    ) -> Result<Arc<Query<T>>> {
        self.get_with_decoder(request, json_decoder::<T>())
    }

    /// Like [`QueryRegistry::get`], with a custom decoder for payload validation.
    ///
    /// The decoder only applies when this call creates the query.
    pub fn get_with_decoder<T: QueryData>(
        &self,
        request: QueryRequest,
        decoder: Decoder<T>,
    ) -> Result<Arc<Query<T>>> {
        let key = request.cache_key();

        let typed = match self.queries.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(&entry.get().typed),
            Entry::Vacant(entry) => {
                debug!(key = %key, "Registering query");
                let query = Query::new(key.clone(), request, decoder, Arc::clone(&self.ctx));
                if self.ctx.shutdown.is_cancelled() {
                    query.close();
                }
                let typed: Arc<dyn Any + Send + Sync> = query.clone();
                entry.insert(RegistryEntry {
                    typed: Arc::clone(&typed),
                    control: Box::new(query),
                });
                typed
            }
        };

        typed.downcast::<Query<T>>().map_err(|_| {
            QueryError::TypeMismatch {
                key,
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
    }

    /// Invalidates the query under `key`. Returns whether it exists.
    pub fn invalidate(
        &self,
        key: &str,
    ) -> bool {
        match self.queries.get(key) {
            Some(entry) => {
                entry.control.invalidate();
                true
            }
            None => false,
        }
    }

    /// Evicts a dormant query. Observed or fetching queries are kept.
    ///
    /// Returns whether the query was removed.
    pub fn remove(
        &self,
        key: &str,
    ) -> bool {
        let removed = self.queries.remove_if(key, |_, entry| entry.control.is_dormant());
        if removed.is_some() {
            debug!(key = %key, "Evicted dormant query");
        }
        removed.is_some()
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.queries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.queries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Cancels every in-flight request and closes every query.
    ///
    /// Pending `wait_response` calls resolve `Ok(None)`; pending
    /// `wait_fresh_response` calls reject with [`QueryError::Closed`].
    pub fn shutdown(&self) {
        info!(queries = self.queries.len(), "Shutting down query registry");
        self.ctx.shutdown.cancel();
        for entry in self.queries.iter() {
            entry.control.close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }
}
