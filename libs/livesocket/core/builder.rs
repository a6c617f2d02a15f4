use crate::config::{HeartbeatPayload, ManagerConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::manager::{ConnectionListener, ConnectionManager};
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ConnectionManager`]
///
/// Every setting is optional. Without a reconnection strategy the manager
/// uses [`FixedDelay::default`] (5 attempts, 1000ms apart).
#[derive(Default)]
pub struct ConnectionManagerBuilder {
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    heartbeat: Option<(Duration, HeartbeatPayload)>,
    connect_timeout: Option<Duration>,
}

impl ConnectionManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Fixed-delay policy from plain numbers, as read from configuration
    pub fn reconnect_policy(self, attempts: usize, delay: Duration) -> Self {
        self.reconnect_strategy(FixedDelay::new(delay, Some(attempts)))
    }

    /// Send the same `payload` every `interval` while connected
    pub fn heartbeat(self, interval: Duration, payload: Frame) -> Self {
        self.heartbeat_with(interval, move || Ok(payload.clone()))
    }

    /// Send a freshly built frame every `interval` while connected
    ///
    /// A tick whose builder fails is skipped with a warning.
    pub fn heartbeat_with(
        mut self,
        interval: Duration,
        make_payload: impl Fn() -> Result<Frame> + Send + Sync + 'static,
    ) -> Self {
        self.heartbeat = Some((interval, Arc::new(make_payload)));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the manager, binding it to the current tokio runtime
    ///
    /// `listener` receives every lifecycle event and inbound frame of every
    /// session this manager spawns.
    pub fn build(self, listener: Arc<dyn ConnectionListener>) -> Result<ConnectionManager> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LiveSocketError::NoRuntime(e.to_string()))?;

        if let Some((interval, _)) = &self.heartbeat {
            if interval.is_zero() {
                return Err(LiveSocketError::Configuration(
                    "heartbeat interval must be greater than zero".to_string(),
                ));
            }
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(LiveSocketError::Configuration(
                "connect timeout must be greater than zero".to_string(),
            ));
        }

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(FixedDelay::default()));

        let config = ManagerConfig {
            reconnect_strategy: Mutex::new(reconnect_strategy),
            heartbeat: self.heartbeat,
            connect_timeout,
        };

        Ok(ConnectionManager::new(config, runtime, listener))
    }
}
