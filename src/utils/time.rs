use std::time::{SystemTime, UNIX_EPOCH};

/// return millisecond
pub(crate) fn timestamp_millis() -> u64 {
    let now = SystemTime::now();
    now.duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_millis() as u64)
        .unwrap_or_default()
}
