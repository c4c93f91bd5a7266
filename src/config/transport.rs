use std::collections::BTreeMap;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_REQUEST_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Request composition parameters
///
/// ```toml
/// [transport]
/// base_url = "https://api.example.com"
/// request_timeout_ms = 30000
///
/// [transport.default_headers]
/// accept = "application/json"
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransportConfig {
    /// Prepended to every request path. Empty means paths are used as-is.
    #[serde(default)]
    pub base_url: String,

    /// Per-request timeout; 0 disables it.
    ///
    /// A timed out request is cancelled at the transport and recorded as a
    /// failure, not as a cancellation.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Headers sent with every request; per-request headers win on conflict
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.is_empty()
            && !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://"))
        {
            return Err(Error::Config(ConfigError::Message(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            ))));
        }
        Ok(())
    }
}
