//! # medsupply
//!
//! Dashboard domain for the medical-supply live feed: typed payloads for
//! every envelope the realtime channel carries, the local order and stock
//! state they mutate, and the reconciler that applies inbound events with
//! role-aware filtering.
//!
//! ## Architecture
//!
//! - **model**: orders, products, viewer roles
//! - **messages**: outbound commands and inbound event decoding
//! - **state**: local dashboard state and user-visible notifications
//! - **reconciler**: inbound envelope → state mutation, exactly once
//! - **announcer**: greeting and order fetch on every connect
//! - **config**: YAML configuration with environment overrides
//!
//! ```rust,ignore
//! let config = DashboardConfig::load("config/dashboard.yaml")?;
//! let dashboard = DashboardState::shared();
//! let reconciler = EventReconciler::new(config.viewer.clone(), dashboard.clone(), Arc::new(LogNotifier))
//!     .with_dedupe_capacity(config.reconciler.dedupe_capacity);
//! let subscriber = Arc::new(ReconcilingSubscriber::new(reconciler));
//! ```

pub mod announcer;
pub mod config;
pub mod messages;
pub mod model;
pub mod reconciler;
pub mod state;

pub use announcer::{Announcement, SessionAnnouncer};
pub use config::{ConfigError, DashboardConfig, RealtimeConfig, ReconcilerConfig};
pub use messages::{
    GetOrders, Greeting, Heartbeat, InboundEvent, MessageError, OrderLine, OutboundCommand, PlaceOrder,
    SetDispatched, StatusChange, StockChange,
};
pub use model::{Order, OrderItem, OrderStatus, Product, Role, Viewer};
pub use reconciler::{
    EventReconciler, ReconcileStats, Reconciled, ReconcilingSubscriber,
    DEFAULT_DEDUPE_CAPACITY,
};
pub use state::{DashboardState, LogNotifier, Notifier, SharedDashboard, StockUpdate};
