//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default whole-request timeout for artifact downloads.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default minimum interval between `Downloading` progress events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(150);

/// Configuration for [`crate::service::DownloadService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory of the artifact cache.
    pub cache_dir: PathBuf,

    /// User agent sent with download requests.
    pub user_agent: String,

    /// Whole-request timeout, including body streaming.
    pub request_timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Minimum interval between progress ticks for one transfer.
    pub progress_interval: Duration,

    /// Broadcast buffer capacity for state events.
    pub event_capacity: usize,
}

impl ServiceConfig {
    /// Creates a configuration with defaults for everything but the cache
    /// directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            user_agent: format!("depot/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            event_capacity: crate::events::DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Overrides the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Overrides the whole-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the minimum progress tick interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Overrides the event buffer capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
