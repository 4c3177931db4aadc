use super::errors::OrderError;
use super::value_objects::NewOrderItem;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: String,
    pub restaurant_id: String,
    pub items: Vec<NewOrderItem>,
}

impl CreateOrder {
    /// Required-field checks that do not need the aggregate.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.trim().is_empty() || self.restaurant_id.trim().is_empty() {
            return Err(OrderError::invalid("user_id and restaurant_id are required"));
        }
        if self.items.is_empty() {
            return Err(OrderError::invalid("order must have at least one item"));
        }
        Ok(())
    }
}
