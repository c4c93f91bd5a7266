//! Persistent store abstraction: the last good response per cache key.
//!
//! The store is best-effort. Read and write failures are logged by the engine
//! and never turn into query errors.

mod memory;
mod sled_store;
pub use memory::*;
pub use sled_store::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::Metadata;
use crate::QueryResponse;
use crate::StoreError;

/// Async key/value contract. No transactional guarantees; last write wins.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get(
        &self,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), StoreError>;
}

/// Persisted form of a [`QueryResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse<T> {
    pub data: T,
    #[serde(default)]
    pub headers: Metadata,
    pub timestamp_ms: u64,
}

impl<T: Serialize> StoredResponse<T> {
    pub fn encode(&self) -> std::result::Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: for<'de> Deserialize<'de>> StoredResponse<T> {
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl<T: Clone> From<&QueryResponse<T>> for StoredResponse<T> {
    fn from(response: &QueryResponse<T>) -> Self {
        Self {
            data: response.data.clone(),
            headers: response.headers.clone(),
            timestamp_ms: response.timestamp_ms,
        }
    }
}

impl<T> From<StoredResponse<T>> for QueryResponse<T> {
    fn from(stored: StoredResponse<T>) -> Self {
        Self {
            data: stored.data,
            headers: stored.headers,
            timestamp_ms: stored.timestamp_ms,
        }
    }
}
