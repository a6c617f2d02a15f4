use crate::traits::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Default time allowed for the WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the keepalive frame, called once per heartbeat tick
pub type HeartbeatPayload = Arc<dyn Fn() -> Result<Frame> + Send + Sync>;

/// Configuration shared by every session a [`ConnectionManager`] spawns
///
/// Built with [`ConnectionManagerBuilder`]. The endpoint is not part of the
/// configuration; it is supplied on each `connect`.
///
/// [`ConnectionManager`]: crate::core::ConnectionManager
/// [`ConnectionManagerBuilder`]: crate::core::ConnectionManagerBuilder
pub struct ManagerConfig {
    /// Reconnection strategy, reset after every successful connect
    pub(crate) reconnect_strategy: Mutex<Box<dyn ReconnectionStrategy>>,

    /// Optional keepalive (interval, payload builder)
    pub(crate) heartbeat: Option<(Duration, HeartbeatPayload)>,

    /// Handshake timeout for each dial
    pub(crate) connect_timeout: Duration,
}

impl ManagerConfig {
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat.as_ref().map(|(interval, _)| *interval)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Upper bound on consecutive reconnection attempts
    pub fn max_reconnect_attempts(&self) -> Option<usize> {
        self.reconnect_strategy.lock().max_attempts()
    }

    pub(crate) fn next_delay(&self, attempt: usize) -> Option<Duration> {
        self.reconnect_strategy.lock().next_delay(attempt)
    }

    pub(crate) fn reset_strategy(&self) {
        self.reconnect_strategy.lock().reset();
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("heartbeat_interval", &self.heartbeat_interval())
            .field("connect_timeout", &self.connect_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts())
            .finish()
    }
}
