use crate::messages::{Heartbeat, OutboundCommand};
use crate::model::Viewer;
use crate::reconciler::DEFAULT_DEDUPE_CAPACITY;
use livesocket::{
    ConnectionManagerBuilder, Frame, LiveSocketError, DEFAULT_INBOX_CAPACITY,
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable overriding `realtime.url`
pub const REALTIME_URL_ENV: &str = "REALTIME_URL";
/// Environment variable carrying the session token sent with commands
pub const SESSION_TOKEN_ENV: &str = "SESSION_TOKEN";

/// Live dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub realtime: RealtimeConfig,
    /// Whose dashboard is reconciled
    pub viewer: Viewer,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session token from .env (not in YAML)
    #[serde(skip)]
    pub session_token: Option<String>,
}

/// Realtime channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Server endpoint (ws:// or wss://)
    pub url: String,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Keepalive interval; no heartbeat when absent
    #[serde(default)]
    pub heartbeat_secs: Option<u64>,
    /// Recent envelopes kept per adapter
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Recently seen event keys kept for duplicate detection (0 disables)
    #[serde(default = "default_dedupe_capacity")]
    pub dedupe_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            dedupe_capacity: default_dedupe_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_attempts() -> usize {
    DEFAULT_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_millis() as u64
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

fn default_dedupe_capacity() -> usize {
    DEFAULT_DEDUPE_CAPACITY
}

impl RealtimeConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Connection manager settings for this endpoint
    pub fn manager_builder(&self) -> ConnectionManagerBuilder {
        let builder = ConnectionManagerBuilder::new()
            .reconnect_policy(self.reconnect_attempts, self.reconnect_delay())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs));

        match self.heartbeat_secs {
            Some(secs) => builder.heartbeat_with(Duration::from_secs(secs), heartbeat_frame),
            None => builder,
        }
    }
}

/// A `heartbeat` envelope stamped now
fn heartbeat_frame() -> livesocket::Result<Frame> {
    Heartbeat::default()
        .to_envelope()
        .map_err(|e| LiveSocketError::Parse(e.to_string()))?
        .to_frame()
}

impl DashboardConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: DashboardConfig = serde_yaml::from_str(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(REALTIME_URL_ENV).filter(|u| !u.is_empty()) {
            info!("Overriding realtime URL from environment variable");
            self.realtime.url = url;
        }

        self.session_token = lookup(SESSION_TOKEN_ENV).filter(|t| !t.is_empty());
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = &self.realtime.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "realtime.url must start with ws:// or wss://, got '{}'",
                url
            )));
        }

        if self.realtime.reconnect_attempts > 0 && self.realtime.reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_delay_ms must be greater than 0 when reconnecting".to_string(),
            ));
        }

        if self.realtime.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.realtime.heartbeat_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "heartbeat_secs must be greater than 0 when set".to_string(),
            ));
        }

        if self.viewer.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "viewer.id cannot be empty".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Realtime URL: {}", self.realtime.url);
        info!(
            "  Reconnect: {} attempts, {} ms apart",
            self.realtime.reconnect_attempts, self.realtime.reconnect_delay_ms
        );
        match self.realtime.heartbeat_secs {
            Some(secs) => info!("  Heartbeat: every {} seconds", secs),
            None => info!("  Heartbeat: disabled"),
        }
        info!("  Viewer: {} ({})", self.viewer.id, self.viewer.role);
        info!("  Dedupe window: {}", self.reconciler.dedupe_capacity);
        info!("  Log level: {}", self.log_level);
        info!(
            "  Session token: {}",
            if self.session_token.is_some() { "set" } else { "not set" }
        );
    }
}
