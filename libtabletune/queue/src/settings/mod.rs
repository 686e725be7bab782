use std::time::Duration;

/// Service-level tuning. Per-bar policy lives in `BarSettings`; these
/// knobs apply to every bar the process hosts.
#[derive(Clone, Debug)]
pub struct Settings {
    pub event_channel_size: usize,
    pub history_capacity: usize,
    pub history_max_age: Duration,
    pub resolver_timeout: Duration,
    pub resolver_retry_delay: Duration,
    pub catalog_ttl: Duration,
    pub catalog_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            event_channel_size: 32,
            history_capacity: 200,
            history_max_age: Duration::from_secs(60 * 60 * 4),
            resolver_timeout: Duration::from_secs(3),
            resolver_retry_delay: Duration::from_millis(250),
            catalog_ttl: Duration::from_secs(60 * 60 * 2),
            catalog_capacity: 1024,
        }
    }
}
