//! Local dashboard state
//!
//! The in-memory view the live feed keeps current between authoritative
//! REST fetches. Mutations here never fail: a reference to an order or
//! product that is not held locally is reported back to the caller, which
//! logs and moves on.

use crate::model::{Order, OrderStatus, Product};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedDashboard = Arc<RwLock<DashboardState>>;

/// Result of a stock update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub previous: i64,
    pub current: i64,
    pub threshold: i64,
}

impl StockUpdate {
    /// True only on the update that takes stock from above the threshold to at or below it
    pub fn crossed_low_stock(&self) -> bool {
        self.previous > self.threshold && self.current <= self.threshold
    }
}

#[derive(Debug, Default)]
pub struct DashboardState {
    orders: Vec<Order>,
    products: HashMap<String, Product>,
    pending_orders: i64,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedDashboard {
        Arc::new(RwLock::new(Self::new()))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn find_order(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// Pending-order counter shown on the admin badge
    ///
    /// Not clamped: duplicate or out-of-order events can drive it negative,
    /// and the next `hydrate` corrects it.
    pub fn pending_orders(&self) -> i64 {
        self.pending_orders
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append an order; returns false if one with the same id is already held
    pub fn append_order(&mut self, order: Order) -> bool {
        if self.find_order(&order.id).is_some() {
            return false;
        }
        self.orders.push(order);
        true
    }

    /// Set an order's status, returning the previous one
    pub fn set_order_status(&mut self, order_id: &str, status: OrderStatus) -> Option<OrderStatus> {
        self.orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .map(|order| std::mem::replace(&mut order.status, status))
    }

    /// Apply a delta to the pending-order counter, returning the new value
    pub fn adjust_pending(&mut self, delta: i64) -> i64 {
        self.pending_orders += delta;
        self.pending_orders
    }

    pub fn upsert_product(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    /// Set a product's stock level; `None` if the product is not held
    pub fn set_stock(&mut self, product_id: &str, stock_number: i64) -> Option<StockUpdate> {
        let product = self.products.get_mut(product_id)?;
        let previous = std::mem::replace(&mut product.stock_number, stock_number);
        Some(StockUpdate {
            previous,
            current: stock_number,
            threshold: product.low_stock_threshold,
        })
    }

    /// Replace local state with an authoritative snapshot
    ///
    /// The pending counter is recomputed from the snapshot's pending orders.
    pub fn hydrate(&mut self, orders: Vec<Order>, products: Vec<Product>) {
        self.pending_orders = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .count() as i64;
        self.orders = orders;
        self.products = products.into_iter().map(|p| (p.id.clone(), p)).collect();

        info!(
            "[Dashboard] Hydrated {} orders ({} pending), {} products",
            self.orders.len(),
            self.pending_orders,
            self.products.len()
        );
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// User-visible notifications raised by the reconciler
///
/// Called outside the state lock; implementations may read the shared
/// dashboard.
pub trait Notifier: Send + Sync {
    fn order_received(&self, order: &Order);

    fn low_stock(&self, product: &Product);
}

/// Notifier that writes to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn order_received(&self, order: &Order) {
        info!(
            "[Notify] New order {} from client {} ({} items)",
            order.id,
            order.client_id,
            order.items.len()
        );
    }

    fn low_stock(&self, product: &Product) {
        warn!(
            "[Notify] Low stock: {} ({}) at {} (threshold {})",
            product.name, product.id, product.stock_number, product.low_stock_threshold
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.into(),
            client_id: "3".into(),
            status,
            items: Vec::new(),
            total_amount: 0.0,
        }
    }

    fn product(id: &str, stock: i64, threshold: i64) -> Product {
        Product {
            id: id.into(),
            name: format!("product {}", id),
            stock_number: stock,
            low_stock_threshold: threshold,
        }
    }

    #[test]
    fn test_append_rejects_duplicate_id() {
        let mut state = DashboardState::new();
        assert!(state.append_order(order("77", OrderStatus::Pending)));
        assert!(!state.append_order(order("77", OrderStatus::Delivered)));

        assert_eq!(state.orders().len(), 1);
        assert_eq!(state.find_order("77").unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_set_status_returns_previous() {
        let mut state = DashboardState::new();
        state.append_order(order("77", OrderStatus::Pending));

        let previous = state.set_order_status("77", OrderStatus::Dispatched);
        assert_eq!(previous, Some(OrderStatus::Pending));
        assert_eq!(state.find_order("77").unwrap().status, OrderStatus::Dispatched);
        assert_eq!(state.set_order_status("nope", OrderStatus::Dispatched), None);
    }

    #[test]
    fn test_pending_counter_is_not_clamped() {
        let mut state = DashboardState::new();
        assert_eq!(state.adjust_pending(-1), -1);
        assert_eq!(state.adjust_pending(2), 1);
    }

    #[test]
    fn test_stock_crossing_reported_once() {
        let mut state = DashboardState::new();
        state.upsert_product(product("p1", 12, 10));

        let first = state.set_stock("p1", 9).unwrap();
        assert!(first.crossed_low_stock());

        let second = state.set_stock("p1", 5).unwrap();
        assert!(!second.crossed_low_stock());

        assert!(state.set_stock("missing", 1).is_none());
    }

    #[test]
    fn test_hydrate_replaces_state() {
        let mut state = DashboardState::new();
        state.append_order(order("old", OrderStatus::Pending));
        state.adjust_pending(5);

        state.hydrate(
            vec![
                order("1", OrderStatus::Pending),
                order("2", OrderStatus::Delivered),
                order("3", OrderStatus::Pending),
            ],
            vec![product("p1", 50, 10)],
        );

        assert!(state.find_order("old").is_none());
        assert_eq!(state.orders().len(), 3);
        assert_eq!(state.pending_orders(), 2);
        assert_eq!(state.product("p1").unwrap().stock_number, 50);
    }
}
