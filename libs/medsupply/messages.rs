//! Realtime Message Types
//!
//! Typed payloads for every envelope the dashboard sends or understands.
//! Outbound commands carry no acknowledgment; the server answers by
//! broadcasting the matching `*-event`.

use crate::model::{Order, OrderStatus};
use livesocket::Envelope;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Envelope types
// =============================================================================

pub const GREETING: &str = "greeting";
pub const HEARTBEAT: &str = "heartbeat";
pub const SET_NEW_ORDER: &str = "set-new-order";
pub const GET_ORDERS: &str = "get-orders";
pub const SET_DISPATCHED: &str = "set-dispatched";
pub const NEW_ORDER_EVENT: &str = "new-order-event";
pub const SET_DISPATCHED_EVENT: &str = "set-dispatched-event";
pub const GET_ORDERS_ERROR: &str = "get-orders-error";
pub const STOCK_CHANGED_EVENT: &str = "stock-changed-event";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessageError {
    #[error("Invalid '{kind}' payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Failed to build '{kind}' envelope: {reason}")]
    Encode { kind: String, reason: String },
}

// =============================================================================
// Outbound commands
// =============================================================================

/// A command the dashboard publishes on the channel
pub trait OutboundCommand: Serialize {
    const KIND: &'static str;

    /// Wrap the command in an envelope stamped with the current time
    fn to_envelope(&self) -> Result<Envelope, MessageError> {
        Envelope::from_payload(Self::KIND, self).map_err(|e| MessageError::Encode {
            kind: Self::KIND.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
}

impl Greeting {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OutboundCommand for Greeting {
    const KIND: &'static str = GREETING;
}

/// Keepalive with an empty payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {}

impl OutboundCommand for Heartbeat {
    const KIND: &'static str = HEARTBEAT;
}

/// One product line of a new order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub products: Vec<OrderLine>,
    pub token: String,
}

impl OutboundCommand for PlaceOrder {
    const KIND: &'static str = SET_NEW_ORDER;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOrders {
    pub token: String,
}

impl OutboundCommand for GetOrders {
    const KIND: &'static str = GET_ORDERS;
}

/// Move an order to a new status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDispatched {
    pub id: String,
    pub new_status: OrderStatus,
    pub token: String,
}

impl OutboundCommand for SetDispatched {
    const KIND: &'static str = SET_DISPATCHED;
}

// =============================================================================
// Inbound events
// =============================================================================

/// Payload of `set-dispatched-event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: String,
    /// Owner of the order
    pub user_id: String,
    pub new_status: OrderStatus,
}

/// Payload of `stock-changed-event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub product_id: String,
    pub stock_number: i64,
}

/// Decoded inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewOrder(Order),
    StatusChanged(StatusChange),
    StockChanged(StockChange),
    /// The server could not serve a `get-orders` request
    OrdersFetchFailed,
    /// Any type the dashboard does not handle
    Unknown(String),
}

impl InboundEvent {
    /// Decode an envelope by its type tag
    ///
    /// Unknown types are not an error; a known type with a payload of the
    /// wrong shape is.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, MessageError> {
        match envelope.kind() {
            NEW_ORDER_EVENT => decode(envelope).map(InboundEvent::NewOrder),
            SET_DISPATCHED_EVENT => decode(envelope).map(InboundEvent::StatusChanged),
            STOCK_CHANGED_EVENT => decode(envelope).map(InboundEvent::StockChanged),
            GET_ORDERS_ERROR => Ok(InboundEvent::OrdersFetchFailed),
            other => Ok(InboundEvent::Unknown(other.to_string())),
        }
    }
}

fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, MessageError> {
    envelope
        .payload_as()
        .map_err(|e| MessageError::InvalidPayload {
            kind: envelope.kind().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn inbound(value: Value) -> Envelope {
        Envelope::decode(&value.to_string()).unwrap()
    }

    #[test]
    fn test_set_dispatched_wire_shape() {
        let envelope = SetDispatched {
            id: "77".into(),
            new_status: OrderStatus::InTransit,
            token: "tok".into(),
        }
        .to_envelope()
        .unwrap();

        assert_eq!(envelope.kind(), "set-dispatched");
        assert_eq!(
            Value::Object(envelope.payload().clone()),
            json!({ "id": "77", "newStatus": "in-transit", "token": "tok" })
        );
        assert!(envelope.timestamp() > 0);
    }

    #[test]
    fn test_heartbeat_is_stamped_at_build_time() {
        let envelope = Heartbeat::default().to_envelope().unwrap();

        assert_eq!(envelope.kind(), "heartbeat");
        assert!(envelope.payload().is_empty());
        assert!(envelope.timestamp() > 0);
    }

    #[test]
    fn test_place_order_wire_shape() {
        let envelope = PlaceOrder {
            products: vec![OrderLine {
                product_id: "p1".into(),
                product_name: "Saline 500ml".into(),
                quantity: 3,
                unit_price: 4.0,
            }],
            token: "tok".into(),
        }
        .to_envelope()
        .unwrap();

        assert_eq!(envelope.kind(), "set-new-order");
        assert_eq!(envelope.payload()["products"][0]["productName"], json!("Saline 500ml"));
        assert_eq!(envelope.payload()["products"][0]["quantity"], json!(3));
    }

    #[test]
    fn test_decode_status_change() {
        let event = InboundEvent::from_envelope(&inbound(json!({
            "type": "set-dispatched-event",
            "payload": { "orderId": "77", "userId": "3", "newStatus": "dispatched" },
            "timestamp": 1
        })))
        .unwrap();

        assert_eq!(
            event,
            InboundEvent::StatusChanged(StatusChange {
                order_id: "77".into(),
                user_id: "3".into(),
                new_status: OrderStatus::Dispatched,
            })
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let event = InboundEvent::from_envelope(&inbound(json!({
            "type": "category-renamed",
            "payload": { "anything": true }
        })))
        .unwrap();

        assert_eq!(event, InboundEvent::Unknown("category-renamed".into()));
    }

    #[test]
    fn test_get_orders_error_ignores_payload() {
        let event = InboundEvent::from_envelope(&inbound(json!({ "type": "get-orders-error" }))).unwrap();
        assert_eq!(event, InboundEvent::OrdersFetchFailed);
    }

    #[test]
    fn test_known_type_with_bad_payload() {
        let err = InboundEvent::from_envelope(&inbound(json!({
            "type": "new-order-event",
            "payload": { "id": "77" }
        })))
        .unwrap_err();

        assert!(matches!(err, MessageError::InvalidPayload { ref kind, .. } if kind == "new-order-event"));
    }
}
