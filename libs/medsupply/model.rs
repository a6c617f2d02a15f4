//! Orders, products and the viewer the dashboard renders for

use serde::{Deserialize, Serialize};

// =============================================================================
// Viewer
// =============================================================================

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Employee => write!(f, "employee"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// The user whose dashboard is being reconciled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    #[serde(alias = "_id")]
    pub id: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff see every order; clients only their own
    pub fn can_see(&self, owner_id: &str) -> bool {
        self.role != Role::Client || self.id == owner_id
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order lifecycle status
///
/// Unrecognised statuses are kept verbatim so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Dispatched,
    InTransit,
    Delivered,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::InTransit => "in-transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Other(s) => s,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "dispatched" => OrderStatus::Dispatched,
            "in-transit" => OrderStatus::InTransit,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        OrderStatus::from(s.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: f64,
}

/// Order as broadcast by the server
///
/// Fields the dashboard does not use are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
}

impl Order {
    /// Sum of line totals, for orders broadcast without `totalAmount`
    pub fn computed_total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.unit_price * f64::from(item.quantity))
            .sum()
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub stock_number: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

impl Product {
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_number <= self.low_stock_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(OrderStatus::from("in-transit"), OrderStatus::InTransit);
        assert_eq!(String::from(OrderStatus::InTransit), "in-transit");

        let other: OrderStatus = serde_json::from_value(json!("returned")).unwrap();
        assert_eq!(other, OrderStatus::Other("returned".into()));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("returned"));
    }

    #[test]
    fn test_order_decodes_minimal_broadcast() {
        let order: Order =
            serde_json::from_value(json!({ "clientId": "3", "id": "77", "status": "pending" }))
                .unwrap();

        assert_eq!(order.id, "77");
        assert_eq!(order.client_id, "3");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_order_accepts_document_id_and_items() {
        let order: Order = serde_json::from_value(json!({
            "_id": "a1",
            "clientId": "3",
            "items": [
                { "productId": "p1", "productName": "Gauze", "quantity": 4, "unitPrice": 2.5 },
                { "productId": "p2", "quantity": 1, "unitPrice": 10.0 }
            ]
        }))
        .unwrap();

        assert_eq!(order.id, "a1");
        assert_eq!(order.computed_total(), 20.0);
    }

    #[test]
    fn test_viewer_visibility() {
        let client = Viewer::new("99", Role::Client);
        assert!(client.can_see("99"));
        assert!(!client.can_see("3"));

        let employee: Viewer = serde_json::from_value(json!({ "_id": "5", "role": "employee" })).unwrap();
        assert!(employee.can_see("3"));
        assert!(!employee.is_admin());
    }
}
