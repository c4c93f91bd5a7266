use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_UNSUBSCRIBE_DEBOUNCE_MS;
use crate::Error;
use crate::Result;

/// Observer bookkeeping parameters
///
/// ```toml
/// [observer]
/// unsubscribe_debounce_ms = 50
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ObserverConfig {
    /// Grace window after the last observer leaves before the query tears down.
    ///
    /// A subscribe arriving inside the window cancels the teardown with no
    /// visible effect, which absorbs re-render churn. Any positive value works;
    /// larger values delay cancellation of requests nobody waits for.
    ///
    /// Default: 50
    #[serde(default = "default_unsubscribe_debounce_ms")]
    pub unsubscribe_debounce_ms: u64,
}

fn default_unsubscribe_debounce_ms() -> u64 {
    DEFAULT_UNSUBSCRIBE_DEBOUNCE_MS
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            unsubscribe_debounce_ms: default_unsubscribe_debounce_ms(),
        }
    }
}

impl ObserverConfig {
    pub fn unsubscribe_debounce(&self) -> Duration {
        Duration::from_millis(self.unsubscribe_debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.unsubscribe_debounce_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "unsubscribe_debounce_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}
