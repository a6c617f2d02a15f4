//! # Livesocket Traits
//!
//! Building blocks shared by the connection manager and the channel:
//!
//! - **LiveSocketError**: error taxonomy surfaced as observable state
//! - **ReconnectionStrategy**: controls the reconnect loop of a session
//! - **Frame**: raw text/binary transport frame

pub mod error;
pub mod frame;
pub mod reconnect;

pub use error::{LiveSocketError, Result};
pub use frame::Frame;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy,
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
};
