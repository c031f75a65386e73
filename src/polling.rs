use std::time::Duration;

/// Controls when the SDK fetches config JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingMode {
    /// A background thread fetches config JSON every `poll_interval`. Evaluation never triggers
    /// a fetch; the first evaluation waits at most `max_init_wait` for the first fetch.
    Auto {
        /// Time between fetches.
        poll_interval: Duration,
        /// Maximum time to wait for the first fetch.
        max_init_wait: Duration,
    },
    /// Config JSON is fetched on evaluation when the cached copy is older than
    /// `cache_refresh_interval`.
    Lazy {
        /// Maximum age of the cached config.
        cache_refresh_interval: Duration,
    },
    /// Config JSON is fetched only on [`Client::refresh`](crate::Client::refresh).
    Manual,
}

impl PollingMode {
    /// Default auto polling interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
    /// Default maximum wait for the first fetch in auto polling mode.
    pub const DEFAULT_MAX_INIT_WAIT: Duration = Duration::from_secs(5);
    /// Default cache refresh interval of lazy loading mode.
    pub const DEFAULT_CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

    /// Auto polling with default settings.
    pub fn auto() -> PollingMode {
        PollingMode::auto_with(Self::DEFAULT_POLL_INTERVAL, Self::DEFAULT_MAX_INIT_WAIT)
    }

    /// Auto polling with a custom interval and max init wait. The interval is at least one
    /// second in production; shorter intervals are accepted for tests.
    pub fn auto_with(poll_interval: Duration, max_init_wait: Duration) -> PollingMode {
        PollingMode::Auto {
            poll_interval,
            max_init_wait,
        }
    }

    /// Lazy loading with the default refresh interval.
    pub fn lazy() -> PollingMode {
        PollingMode::lazy_with(Self::DEFAULT_CACHE_REFRESH_INTERVAL)
    }

    /// Lazy loading with a custom refresh interval.
    pub fn lazy_with(cache_refresh_interval: Duration) -> PollingMode {
        PollingMode::Lazy {
            cache_refresh_interval,
        }
    }

    /// Manual polling.
    pub fn manual() -> PollingMode {
        PollingMode::Manual
    }

    /// Short identifier sent in the user agent header.
    pub(crate) fn identifier(&self) -> &'static str {
        match self {
            PollingMode::Auto { .. } => "a",
            PollingMode::Lazy { .. } => "l",
            PollingMode::Manual => "m",
        }
    }
}

impl Default for PollingMode {
    fn default() -> Self {
        PollingMode::auto()
    }
}
