use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The total is computed once in `create` and never re-derived from the items
// afterwards. Status transitions are unconditional: confirming an order that
// already failed is accepted. The store-side transition used by the validation
// consumer is the one that guards against re-applying a verdict.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    /// Bumped on every status mutation. Nothing checks it on write.
    pub version: i32,

    pub user_id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new `Pending` order at version 1.
    pub fn create(
        user_id: impl Into<String>,
        restaurant_id: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Result<Self, OrderError> {
        validate_items(&items)?;
        let total_amount = total_of(&items)
            .ok_or_else(|| OrderError::invalid("order total overflows"))?;
        if total_amount >= MAX_AMOUNT {
            return Err(OrderError::invalid(format!(
                "order total {total_amount} exceeds {MAX_AMOUNT}"
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            version: 1,
            user_id: user_id.into(),
            restaurant_id: restaurant_id.into(),
            total_amount,
            items,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn confirm(&mut self) {
        self.transition(OrderStatus::Confirmed);
    }

    pub fn fail(&mut self) {
        self.transition(OrderStatus::Failed);
    }

    pub fn cancel(&mut self) {
        self.transition(OrderStatus::Cancelled);
    }

    fn transition(&mut self, status: OrderStatus) {
        self.status = status;
        // Never move backwards, even if the wall clock does.
        self.updated_at = Utc::now().max(self.updated_at);
        self.version += 1;
    }
}

/// Exclusive upper bound of a stored price or total: `NUMERIC(12, 2)` keeps
/// ten integer digits.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Money is stored with cent precision.
pub const AMOUNT_SCALE: u32 = 2;

/// Σ price × quantity over the line items, `None` on overflow.
pub fn total_of(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.line_total()?))
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::invalid("order must have at least one item"));
    }

    for item in items {
        if item.quantity <= 0 {
            return Err(OrderError::invalid(format!(
                "item {} has non-positive quantity {}",
                item.item_id, item.quantity
            )));
        }
        if item.price.is_sign_negative() {
            return Err(OrderError::invalid(format!(
                "item {} has negative price {}",
                item.item_id, item.price
            )));
        }
        // Anything finer than a cent would be rounded by the store and no
        // longer match the total published with the event.
        if item.price.normalize().scale() > AMOUNT_SCALE {
            return Err(OrderError::invalid(format!(
                "item {} price {} has more than {AMOUNT_SCALE} decimal places",
                item.item_id, item.price
            )));
        }
        if item.price >= MAX_AMOUNT {
            return Err(OrderError::invalid(format!(
                "item {} price {} exceeds {MAX_AMOUNT}",
                item.item_id, item.price
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::NewOrderItem;
    use rust_decimal_macros::dec;

    fn items(prices: &[(Decimal, i32)]) -> Vec<OrderItem> {
        prices
            .iter()
            .enumerate()
            .map(|(i, (price, qty))| {
                NewOrderItem::new(format!("sku-{i}"), format!("item {i}"), *price, *qty).into_item()
            })
            .collect()
    }

    #[test]
    fn test_create_sets_initial_state() {
        let order = Order::create("u1", "r1", items(&[(dec!(50), 1), (dec!(60), 1)])).unwrap();

        assert_eq!(order.total_amount, dec!(110));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(order.created_at, order.updated_at);
        assert_eq!(order.items.len(), 2);
    }

    #[test]
    fn test_total_has_no_rounding_drift() {
        let order = Order::create(
            "u1",
            "r1",
            items(&[(dec!(0.10), 3), (dec!(0.20), 7), (dec!(33.33), 3)]),
        )
        .unwrap();

        assert_eq!(order.total_amount, dec!(101.69));
    }

    #[test]
    fn test_items_keep_their_order() {
        let order = Order::create("u1", "r1", items(&[(dec!(1), 1), (dec!(2), 1), (dec!(3), 1)])).unwrap();
        let skus: Vec<_> = order.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(skus, vec!["sku-0", "sku-1", "sku-2"]);
    }

    #[test]
    fn test_empty_items_rejected() {
        let result = Order::create("u1", "r1", vec![]);
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Order::create("u1", "r1", items(&[(dec!(10), 0)]));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = Order::create("u1", "r1", items(&[(dec!(-1), 1)]));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_total_overflow_rejected() {
        let result = Order::create("u1", "r1", items(&[(Decimal::MAX, 2)]));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_sum_overflow_rejected() {
        assert_eq!(total_of(&items(&[(Decimal::MAX, 1), (Decimal::ONE, 1)])), None);
    }

    #[test]
    fn test_sub_cent_price_rejected() {
        let result = Order::create("u1", "r1", items(&[(dec!(99.995), 1)]));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));

        let result = Order::create("u1", "r1", items(&[(dec!(33.335), 3)]));
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let order = Order::create("u1", "r1", items(&[(dec!(12.5000), 2)])).unwrap();
        assert_eq!(order.total_amount, dec!(25));
    }

    #[test]
    fn test_amounts_beyond_column_width_rejected() {
        assert_eq!(MAX_AMOUNT, dec!(10000000000));

        let price = Order::create("u1", "r1", items(&[(dec!(10000000000), 1)]));
        assert!(matches!(price, Err(OrderError::InvalidInput(_))));

        let total = Order::create("u1", "r1", items(&[(dec!(9999999999.99), 2)]));
        assert!(matches!(total, Err(OrderError::InvalidInput(_))));

        let largest = Order::create("u1", "r1", items(&[(dec!(9999999999.99), 1)])).unwrap();
        assert_eq!(largest.total_amount, dec!(9999999999.99));
    }

    #[test]
    fn test_each_transition_bumps_version_once() {
        let mut order = Order::create("u1", "r1", items(&[(dec!(150), 1)])).unwrap();

        let before = order.updated_at;
        order.confirm();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.version, 2);
        assert!(order.updated_at >= before);

        let before = order.updated_at;
        order.fail();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.version, 3);
        assert!(order.updated_at >= before);

        let before = order.updated_at;
        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.version, 4);
        assert!(order.updated_at >= before);
    }

    #[test]
    fn test_transitions_do_not_reject_out_of_order_moves() {
        let mut order = Order::create("u1", "r1", items(&[(dec!(150), 1)])).unwrap();
        order.fail();
        order.confirm();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.version, 3);
    }

    #[test]
    fn test_total_is_not_recomputed_after_creation() {
        let mut order = Order::create("u1", "r1", items(&[(dec!(150), 1)])).unwrap();
        order.items[0].quantity = 10;
        order.confirm();
        assert_eq!(order.total_amount, dec!(150));
    }
}
