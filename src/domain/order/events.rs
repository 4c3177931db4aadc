use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Order;
use super::errors::OrderError;
use super::value_objects::OrderItem;

/// Creation channel. Consumed by the validation processor.
pub const ORDERS_TOPIC: &str = "orders";
/// Status-result channel. Carries confirmations and failures.
pub const ORDER_STATUS_TOPIC: &str = "order-status";

// ============================================================================
// Order Events - facts published on the bus
// ============================================================================

/// Union of every event published for an order.
///
/// The discriminant travels in the `event_type` field next to the payload
/// fields, so a reader can branch on it before looking at anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum OrderEvent {
    #[serde(rename = "OrderCreated")]
    Created(OrderCreated),
    #[serde(rename = "OrderConfirmed")]
    Confirmed(OrderConfirmed),
    #[serde(rename = "OrderFailed")]
    Failed(OrderFailed),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCreated {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub user_id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderConfirmed {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderFailed {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Snapshot of a freshly persisted order.
    pub fn created(order: &Order) -> Self {
        OrderEvent::Created(OrderCreated {
            event_id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id.clone(),
            restaurant_id: order.restaurant_id.clone(),
            items: order.items.clone(),
            total_amount: order.total_amount,
            created_at: order.created_at,
        })
    }

    pub fn confirmed(order_id: Uuid) -> Self {
        OrderEvent::Confirmed(OrderConfirmed {
            event_id: Uuid::new_v4(),
            order_id,
            confirmed_at: Utc::now(),
        })
    }

    pub fn failed(order_id: Uuid, reason: impl Into<String>) -> Self {
        OrderEvent::Failed(OrderFailed {
            event_id: Uuid::new_v4(),
            order_id,
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(e) => e.event_id,
            OrderEvent::Confirmed(e) => e.event_id,
            OrderEvent::Failed(e) => e.event_id,
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(e) => e.order_id,
            OrderEvent::Confirmed(e) => e.order_id,
            OrderEvent::Failed(e) => e.order_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::Confirmed(_) => "OrderConfirmed",
            OrderEvent::Failed(_) => "OrderFailed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created(e) => e.created_at,
            OrderEvent::Confirmed(e) => e.confirmed_at,
            OrderEvent::Failed(e) => e.failed_at,
        }
    }

    /// Channel the event belongs on.
    pub fn topic(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => ORDERS_TOPIC,
            OrderEvent::Confirmed(_) | OrderEvent::Failed(_) => ORDER_STATUS_TOPIC,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, OrderError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, OrderError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
