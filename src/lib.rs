//! # q-engine
//!
//! A reactive, cache-coherent, deduplicating remote-data fetch engine.
//!
//! Many independent observers may request the same remote resource while the
//! engine guarantees:
//!
//! - at most one in-flight request per logical resource ([`Query`] per cache key)
//! - transparent cancellation once no observer remains interested
//! - transparent resumption of cached or persisted data on restart
//! - two consistency contracts: [`Query::wait_response`] accepts any non-stale
//!   result, [`Query::wait_fresh_response`] forces and awaits a brand-new fetch
//!
//! HTTP semantics live behind the [`Transport`] trait and persistence behind the
//! [`Store`] trait; both are supplied by the application.
//!
//! ```ignore
//! let registry = QueryRegistry::with_memory_store(EngineConfig::new()?.validate()?, transport);
//! let balance = registry.get::<Balance>(QueryRequest::get("/balance").with_param("address", addr))?;
//!
//! let observer = balance.observe();          // subscribes, starts fetching
//! let latest = balance.wait_response().await?;
//! let fresh = balance.wait_fresh_response().await?;
//! drop(observer);                            // debounced teardown
//! ```

mod config;
pub mod constants;
mod errors;
pub mod metrics;
mod observer;
mod query;
mod registry;
mod request;
mod store;
mod transport;
pub(crate) mod utils;

pub use config::*;
pub use errors::*;
pub use observer::*;
pub use query::Query;
pub use query::QueryData;
pub use query::QueryResponse;
pub use query::QuerySnapshot;
pub use registry::*;
pub use request::*;
pub use store::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
