// -
// Observation

/// Grace window between the last observer leaving and the query tearing down
pub const DEFAULT_UNSUBSCRIBE_DEBOUNCE_MS: u64 = 50;

// -
// Cache

/// Prefix prepended to cache keys in the persistent store
pub const DEFAULT_STORE_KEY_PREFIX: &str = "q-engine:";

/// Sled tree holding persisted responses
pub const SLED_RESPONSE_TREE: &str = "_query_responses";

// -
// Transport

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Failure message recorded when a request exceeds its timeout
pub const TIMEOUT_FAILURE_MESSAGE: &str = "request timed out";

// -
// Environment

/// Environment variable naming an extra config file
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Prefix of environment overrides, e.g. `QENGINE__OBSERVER__UNSUBSCRIBE_DEBOUNCE_MS`
pub const ENV_PREFIX: &str = "QENGINE";
