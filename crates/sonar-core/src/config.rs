use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use std::time::Duration;

    /// The default value for `probe-interval`.
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

    /// The default value for `timeout`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// The default value for `track-app-lifecycle`.
    pub const DEFAULT_TRACK_APP_LIFECYCLE: bool = true;

    /// The default capacity of the response broadcast channel.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;
}

/// Probe timing configuration.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Configuration {
    /// The delay between a probe completing and the next probe being sent.
    pub probe_interval: Duration,
    /// How long to wait for a reply before a probe times out.
    pub timeout: Duration,
    /// Whether to halt on host suspension and restart on resumption.
    pub track_app_lifecycle: bool,
}

impl Configuration {
    #[must_use]
    pub const fn new(probe_interval: Duration, timeout: Duration) -> Self {
        Self {
            probe_interval,
            timeout,
            track_app_lifecycle: defaults::DEFAULT_TRACK_APP_LIFECYCLE,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(defaults::DEFAULT_PROBE_INTERVAL, defaults::DEFAULT_TIMEOUT)
    }
}
