use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// A line entry attached to an order. Immutable once the order exists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    /// Catalog identifier of the purchased item.
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    /// `None` when price × quantity overflows `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A line entry as submitted by a client, before it gets an identifier.
#[derive(Deserialize, Clone, Debug)]
pub struct NewOrderItem {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl NewOrderItem {
    pub fn new(item_id: impl Into<String>, name: impl Into<String>, price: Decimal, quantity: i32) -> Self {
        Self {
            id: None,
            item_id: item_id.into(),
            name: name.into(),
            price,
            quantity,
        }
    }

    /// Attach a synthetic identifier when the client did not send one.
    pub fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            item_id: self.item_id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Failed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "FAILED" => Ok(OrderStatus::Failed),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
