//! Event Reconciler
//!
//! Turns inbound envelopes into local dashboard mutations.
//!
//! | type                   | applies when                          | effect                                   |
//! |------------------------|---------------------------------------|------------------------------------------|
//! | `new-order-event`      | viewer owns the order or is staff     | append order; admin: pending +1, notify  |
//! | `set-dispatched-event` | viewer owns the order or is staff     | set status; adjust pending (see below)   |
//! | `stock-changed-event`  | always                                | set stock; notify on low-stock crossing  |
//! | `get-orders-error`     | always                                | logged                                   |
//! | anything else          | never                                 | logged and dropped                       |
//!
//! Pending counter on a status change: entering `dispatched` is -1 for an
//! admin and +1 for everyone else; entering `in-transit` is -1 for everyone.
//!
//! The visibility check is a UI filter for traffic broadcast on the shared
//! channel. It is not an authorization boundary.
//!
//! Redelivered events are caught by a bounded window of recently seen keys.
//! With the window disabled a repeated status event is applied twice.

use crate::messages::{
    InboundEvent, StatusChange, StockChange, NEW_ORDER_EVENT, SET_DISPATCHED_EVENT,
    STOCK_CHANGED_EVENT,
};
use crate::model::{Order, OrderStatus, Viewer};
use crate::state::{Notifier, SharedDashboard};
use livesocket::{Envelope, LiveSocketError, Subscriber};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of recent event keys remembered for duplicate detection
pub const DEFAULT_DEDUPE_CAPACITY: usize = 256;

// =============================================================================
// Outcome
// =============================================================================

/// What reconciling one envelope did
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    OrderAppended {
        order_id: String,
        pending_delta: i64,
    },
    /// `found` is false when the order is not held locally; the counter
    /// adjustment is applied regardless
    StatusUpdated {
        order_id: String,
        status: OrderStatus,
        pending_delta: i64,
        found: bool,
    },
    StockUpdated {
        product_id: String,
        stock_number: i64,
        low_stock: bool,
    },
    /// Order already held locally; nothing changed
    AlreadyPresent { order_id: String },
    /// Stock event for a product not held locally
    UnknownProduct { product_id: String },
    /// Not visible to this viewer
    Filtered { kind: String, owner_id: String },
    /// Seen within the dedupe window
    Duplicate { kind: String },
    FetchFailed,
    /// Known type whose payload could not be decoded
    Rejected { kind: String, reason: String },
    /// Type the dashboard does not handle
    Ignored { kind: String },
}

impl Reconciled {
    /// True if local state changed
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            Reconciled::OrderAppended { .. }
                | Reconciled::StatusUpdated { .. }
                | Reconciled::StockUpdated { .. }
        )
    }
}

// =============================================================================
// Dedupe window
// =============================================================================

/// FIFO of recently seen event keys
struct DedupeWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `key`; false if it was already in the window
    fn insert(&mut self, key: String) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Applies inbound events to the dashboard of one viewer
pub struct EventReconciler {
    viewer: Viewer,
    dashboard: SharedDashboard,
    notifier: Arc<dyn Notifier>,
    dedupe: Mutex<DedupeWindow>,
}

impl EventReconciler {
    pub fn new(viewer: Viewer, dashboard: SharedDashboard, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            viewer,
            dashboard,
            notifier,
            dedupe: Mutex::new(DedupeWindow::new(DEFAULT_DEDUPE_CAPACITY)),
        }
    }

    /// Size of the duplicate window; 0 disables duplicate detection
    pub fn with_dedupe_capacity(mut self, capacity: usize) -> Self {
        self.dedupe = Mutex::new(DedupeWindow::new(capacity));
        self
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn dashboard(&self) -> &SharedDashboard {
        &self.dashboard
    }

    /// Reconcile one inbound envelope
    pub fn reconcile(&self, envelope: &Envelope) -> Reconciled {
        let event = match InboundEvent::from_envelope(envelope) {
            Ok(event) => event,
            Err(e) => {
                warn!("[Reconciler] Dropping envelope: {}", e);
                return Reconciled::Rejected {
                    kind: envelope.kind().to_string(),
                    reason: e.to_string(),
                };
            }
        };

        if let Some(key) = dedupe_key(&event, envelope.timestamp()) {
            if !self.dedupe.lock().insert(key) {
                debug!("[Reconciler] Duplicate '{}' dropped", envelope.kind());
                return Reconciled::Duplicate {
                    kind: envelope.kind().to_string(),
                };
            }
        }

        match event {
            InboundEvent::NewOrder(order) => self.apply_new_order(order),
            InboundEvent::StatusChanged(change) => self.apply_status_change(change),
            InboundEvent::StockChanged(change) => self.apply_stock_change(change),
            InboundEvent::OrdersFetchFailed => {
                warn!("[Reconciler] Server failed to fetch orders");
                Reconciled::FetchFailed
            }
            InboundEvent::Unknown(kind) => {
                debug!("[Reconciler] Ignoring unhandled type '{}'", kind);
                Reconciled::Ignored { kind }
            }
        }
    }

    fn apply_new_order(&self, order: Order) -> Reconciled {
        if !self.viewer.can_see(&order.client_id) {
            debug!(
                "[Reconciler] Order {} belongs to client {}, not shown to {}",
                order.id, order.client_id, self.viewer.id
            );
            return Reconciled::Filtered {
                kind: NEW_ORDER_EVENT.to_string(),
                owner_id: order.client_id,
            };
        }

        let pending_delta = if self.viewer.is_admin() { 1 } else { 0 };
        let order_id = order.id.clone();

        {
            let mut dashboard = self.dashboard.write();
            if !dashboard.append_order(order.clone()) {
                debug!("[Reconciler] Order {} already held, skipping", order_id);
                return Reconciled::AlreadyPresent { order_id };
            }
            dashboard.adjust_pending(pending_delta);
        }

        info!("[Reconciler] Order {} added", order_id);
        if self.viewer.is_admin() {
            self.notifier.order_received(&order);
        }

        Reconciled::OrderAppended {
            order_id,
            pending_delta,
        }
    }

    fn apply_status_change(&self, change: StatusChange) -> Reconciled {
        if !self.viewer.can_see(&change.user_id) {
            debug!(
                "[Reconciler] Status change for order {} of user {}, not shown to {}",
                change.order_id, change.user_id, self.viewer.id
            );
            return Reconciled::Filtered {
                kind: SET_DISPATCHED_EVENT.to_string(),
                owner_id: change.user_id,
            };
        }

        let pending_delta = match change.new_status {
            OrderStatus::Dispatched if self.viewer.is_admin() => -1,
            OrderStatus::Dispatched => 1,
            OrderStatus::InTransit => -1,
            _ => 0,
        };

        let (previous, pending) = {
            let mut dashboard = self.dashboard.write();
            let previous = dashboard.set_order_status(&change.order_id, change.new_status.clone());
            (previous, dashboard.adjust_pending(pending_delta))
        };

        match &previous {
            Some(previous) => info!(
                "[Reconciler] Order {}: {} -> {} (pending {})",
                change.order_id, previous, change.new_status, pending
            ),
            None => warn!(
                "[Reconciler] Order {} not held locally, status {} not applied (pending {})",
                change.order_id, change.new_status, pending
            ),
        }

        Reconciled::StatusUpdated {
            order_id: change.order_id,
            status: change.new_status,
            pending_delta,
            found: previous.is_some(),
        }
    }

    fn apply_stock_change(&self, change: StockChange) -> Reconciled {
        let (update, product) = {
            let mut dashboard = self.dashboard.write();
            let update = dashboard.set_stock(&change.product_id, change.stock_number);
            (update, dashboard.product(&change.product_id).cloned())
        };

        let (Some(update), Some(product)) = (update, product) else {
            warn!(
                "[Reconciler] Stock change for unknown product {}, dropped",
                change.product_id
            );
            return Reconciled::UnknownProduct {
                product_id: change.product_id,
            };
        };

        let low_stock = update.crossed_low_stock();
        debug!(
            "[Reconciler] Product {} stock {} -> {}",
            product.id, update.previous, update.current
        );
        if low_stock {
            self.notifier.low_stock(&product);
        }

        Reconciled::StockUpdated {
            product_id: change.product_id,
            stock_number: change.stock_number,
            low_stock,
        }
    }
}

fn dedupe_key(event: &InboundEvent, timestamp: i64) -> Option<String> {
    match event {
        InboundEvent::NewOrder(order) => Some(format!("{}:{}", NEW_ORDER_EVENT, order.id)),
        InboundEvent::StatusChanged(change) => Some(format!(
            "{}:{}:{}:{}",
            SET_DISPATCHED_EVENT, change.order_id, change.new_status, timestamp
        )),
        InboundEvent::StockChanged(change) => Some(format!(
            "{}:{}:{}:{}",
            STOCK_CHANGED_EVENT, change.product_id, change.stock_number, timestamp
        )),
        InboundEvent::OrdersFetchFailed | InboundEvent::Unknown(_) => None,
    }
}

// =============================================================================
// Subscriber binding
// =============================================================================

/// Outcome counters of a [`ReconcilingSubscriber`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub applied: u64,
    pub filtered: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub rejected: u64,
}

/// Runs the reconciler on every message the channel delivers
pub struct ReconcilingSubscriber {
    reconciler: EventReconciler,
    applied: AtomicU64,
    filtered: AtomicU64,
    duplicates: AtomicU64,
    ignored: AtomicU64,
    rejected: AtomicU64,
}

impl ReconcilingSubscriber {
    pub fn new(reconciler: EventReconciler) -> Self {
        Self {
            reconciler,
            applied: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    pub fn stats(&self) -> ReconcileStats {
        ReconcileStats {
            applied: self.applied.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &Reconciled) {
        let counter = match outcome {
            o if o.is_applied() => &self.applied,
            Reconciled::Filtered { .. } => &self.filtered,
            Reconciled::Duplicate { .. } => &self.duplicates,
            Reconciled::Rejected { .. } => &self.rejected,
            _ => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Subscriber for ReconcilingSubscriber {
    fn on_connect(&self) {
        let viewer = &self.reconciler.viewer;
        info!("[Reconciler] Live feed connected for {} {}", viewer.role, viewer.id);
    }

    fn on_disconnect(&self, reason: &str) {
        info!("[Reconciler] Live feed disconnected: {}", reason);
    }

    fn on_error(&self, error: &LiveSocketError) {
        warn!("[Reconciler] Live feed error: {}", error);
    }

    fn on_message(&self, envelope: &Envelope) {
        let outcome = self.reconciler.reconcile(envelope);
        debug!("[Reconciler] {} -> {:?}", envelope.kind(), outcome);
        self.record(&outcome);
    }
}
