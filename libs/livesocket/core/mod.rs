//! # Livesocket Core
//!
//! The Connection Manager and its supporting pieces:
//!
//! - **Single session**: at most one live transport session per manager
//! - **Reconnect loop**: pluggable [`ReconnectionStrategy`], 5 x 1000ms by default
//! - **Lock-free state**: atomic connection state and counters
//! - **Listener seam**: lifecycle events and inbound frames go to one [`ConnectionListener`]
//!
//! ## Example
//!
//! ```rust,ignore
//! let manager = ConnectionManager::builder()
//!     .reconnect_policy(5, Duration::from_millis(1000))
//!     .heartbeat(Duration::from_secs(25), Frame::Text("ping".into()))
//!     .build(listener)?;
//!
//! manager.connect("ws://localhost:4000/live")?;
//! ```

pub mod builder;
pub mod config;
pub mod connection_state;
pub mod manager;

pub use builder::ConnectionManagerBuilder;
pub use config::{HeartbeatPayload, ManagerConfig};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use manager::{
    ConnectionListener, ConnectionManager, Metrics, REASON_CLIENT_DISCONNECT,
    REASON_SERVER_DISCONNECT,
};

pub use crate::traits::*;
