//! # Livesocket
//!
//! Real-time messaging core for the dashboard: one shared WebSocket session,
//! a typed envelope contract on top of it, and per-consumer subscriptions.
//!
//! ## Layers
//!
//! - **core**: [`ConnectionManager`] owns the transport session, reconnects per policy
//! - **channel**: [`MessageChannel`] decodes envelopes and fans them out to every
//!   registered [`Subscriber`]
//! - **adapter**: [`SubscriptionAdapter`] binds one consumer to the channel and
//!   exposes `is_connected` / `last_message` / `error`
//!
//! Transport and channel failures never propagate as panics or `Err` into
//! consumers; they surface as observable state.

pub mod adapter;
pub mod channel;
pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    builder, config, connection_state, manager,
    builder::ConnectionManagerBuilder,
    config::{HeartbeatPayload, ManagerConfig},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    manager::{
        ConnectionListener, ConnectionManager, Metrics, REASON_CLIENT_DISCONNECT,
        REASON_SERVER_DISCONNECT,
    },
};

pub use adapter::{SubscriptionAdapter, DEFAULT_INBOX_CAPACITY};
pub use channel::{
    Envelope, MessageChannel, Subscriber, SubscriberRegistry, SubscriptionId, WeakMessageChannel,
};
