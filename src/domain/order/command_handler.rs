use std::sync::Arc;

use uuid::Uuid;

use super::aggregate::Order;
use super::commands::CreateOrder;
use super::errors::OrderError;
use super::events::OrderEvent;
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Store → Event
//
// The store write and the event publish are not atomic. An order that was
// stored but whose OrderCreated never reached the bus stays `Pending` until
// something outside this process notices it.
//
// ============================================================================

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
}

impl OrderCommandHandler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
        }
    }

    /// Validate, persist and announce a new order.
    ///
    /// Returns the stored order once the write committed, whether or not the
    /// OrderCreated event could be published.
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order, OrderError> {
        command.validate()?;

        let CreateOrder {
            user_id,
            restaurant_id,
            items,
        } = command;
        let items = items.into_iter().map(|item| item.into_item()).collect();
        let order = Order::create(user_id, restaurant_id, items)?;

        if let Err(e) = self.store.create(&order).await {
            self.metrics.db_errors.inc();
            tracing::error!(
                error = %e,
                order_id = %order.id,
                user_id = %order.user_id,
                "Failed to persist order"
            );
            return Err(e);
        }

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            restaurant_id = %order.restaurant_id,
            total_amount = %order.total_amount,
            items = order.items.len(),
            "Order created"
        );

        if let Err(e) = self.publisher.publish_event(&OrderEvent::created(&order)).await {
            self.metrics.kafka_errors.inc();
            tracing::error!(
                error = %e,
                order_id = %order.id,
                "Failed to publish OrderCreated, order stays pending"
            );
        }

        self.metrics.orders_created.inc();
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store.get(id).await.map_err(|e| {
            match &e {
                OrderError::NotFound(_) => tracing::debug!(order_id = %id, "Order not found"),
                _ => {
                    self.metrics.db_errors.inc();
                    tracing::error!(error = %e, order_id = %id, "Failed to load order");
                }
            }
            e
        })
    }

    /// Most recent orders of `user_id`, newest first, at most `limit`.
    pub async fn list_orders(&self, user_id: &str, limit: i64) -> Result<Vec<Order>, OrderError> {
        self.store.list(user_id, limit).await.map_err(|e| {
            self.metrics.db_errors.inc();
            tracing::error!(error = %e, user_id = %user_id, "Failed to list orders");
            e
        })
    }
}
