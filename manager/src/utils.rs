use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Current time in seconds since the Unix epoch
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}
