//! Prometheus counters for fetch outcomes and swallowed store failures.
//!
//! Counters are process-wide. Call [`register_custom_metrics`] once with the
//! registry your exporter scrapes, or use [`gather`] with the crate registry.


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

pub(crate) const OUTCOME_STARTED: &str = "started";
pub(crate) const OUTCOME_SUCCEEDED: &str = "succeeded";
pub(crate) const OUTCOME_FAILED: &str = "failed";
pub(crate) const OUTCOME_CANCELLED: &str = "cancelled";
pub(crate) const OUTCOME_SUPERSEDED: &str = "superseded";

pub(crate) const STORE_OP_GET: &str = "get";
pub(crate) const STORE_OP_SET: &str = "set";
pub(crate) const STORE_OP_DECODE: &str = "decode";

lazy_static! {
    pub static ref FETCH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("q_engine_fetch_total", "Transport requests by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("q_engine_store_errors_total", "Swallowed persistent store failures"),
        &["op"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_DEFAULT: Once = Once::new();

/// Registers the engine counters on `registry`
pub fn register_custom_metrics(registry: &Registry) {
    for collector in [FETCH_TOTAL.clone(), STORE_ERRORS_TOTAL.clone()] {
        if let Err(e) = registry.register(Box::new(collector)) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

pub(crate) fn ensure_registered() {
    REGISTER_DEFAULT.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Renders the crate registry in the Prometheus text format
pub fn gather() -> String {
    ensure_registered();
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode engine metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub(crate) fn record_fetch(outcome: &str) {
    FETCH_TOTAL.with_label_values(&[outcome]).inc();
}

pub(crate) fn record_store_error(op: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[op]).inc();
}
