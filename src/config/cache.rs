use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_STORE_KEY_PREFIX;
use crate::Error;
use crate::Result;

/// Response caching parameters
///
/// ```toml
/// [cache]
/// stale_time_ms = 0
/// hydrate = true
/// persist = true
/// key_prefix = "q-engine:"
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CacheConfig {
    /// Age below which a network response satisfies a new observer without a refetch.
    ///
    /// Only consulted when the observer count goes from zero to one.
    /// `waitResponse` ignores it.
    ///
    /// Default: 0 (every new observation refetches)
    #[serde(default)]
    pub stale_time_ms: u64,

    /// Read the persisted response on first observation
    #[serde(default = "default_true")]
    pub hydrate: bool,

    /// Write every successful response to the store
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Prefix prepended to cache keys in the store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    DEFAULT_STORE_KEY_PREFIX.to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 0,
            hydrate: default_true(),
            persist: default_true(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    /// Store key under which the response for `cache_key` is persisted
    pub fn store_key(
        &self,
        cache_key: &str,
    ) -> String {
        format!("{}{}", self.key_prefix, cache_key)
    }

    pub fn validate(&self) -> Result<()> {
        if (self.hydrate || self.persist) && self.key_prefix.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "cache key_prefix cannot be empty while hydration or persistence is enabled".into(),
            )));
        }
        Ok(())
    }
}
