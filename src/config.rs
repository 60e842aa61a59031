//! Configuration for connection lifecycle behavior

use std::time::Duration;

/// Configurable parameters for the connection lifecycle
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether reconnection after an unintentional loss is demand-driven.
    /// When `true` the machine parks in `Idle` after a loss and only attempts
    /// to reconnect once a caller asks for the channel again; when `false` it
    /// immediately enters the backoff retry loop.
    pub lazy: bool,

    /// Whether the very first connect attempt is persistent. When `true` an
    /// initial connect failure enters the retry loop (or `Idle` if also
    /// `lazy`) instead of giving up back to `NotConnected`.
    pub persistent: bool,

    /// Maximum time a channel may sit idle before the embedding transport
    /// layer reports it via a channel-idle notification, which triggers a
    /// keep-alive probe. Zero disables keep-alive probing entirely.
    pub max_idle: Duration,

    /// Maximum delay between consecutive reconnect attempts. The delay
    /// doubles from 1 second on each consecutive failure; the cap is rounded
    /// up to the next power of two so the doubling sequence stays exact,
    /// e.g. 1, 2, 4, 8, 16, 32, 32, 32, ...
    pub max_reconnect_delay: Duration,
}

impl Config {
    /// Backoff cap in whole seconds, rounded up to the next power of two
    pub(crate) fn reconnect_delay_cap(&self) -> u64 {
        self.max_reconnect_delay.as_secs().max(1).next_power_of_two()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lazy: false,
            persistent: true,
            max_idle: Duration::from_secs(15),
            max_reconnect_delay: Duration::from_secs(32),
        }
    }
}
