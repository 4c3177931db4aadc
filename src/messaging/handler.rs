use std::sync::Arc;

use uuid::Uuid;

use super::EventPublisher;
use crate::domain::order::{OrderError, OrderEvent, OrderStatus, ValidationPolicy, Verdict};
use crate::metrics::Metrics;
use crate::store::{OrderStore, Transition};

/// What happened to one message from the creation channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Confirmed { order_id: Uuid },
    Failed { order_id: Uuid, reason: String },
    /// Redelivery of an order that already left `Pending`; nothing written or published.
    AlreadySettled { order_id: Uuid, status: OrderStatus },
    /// Valid event of a kind this consumer does not act on.
    Ignored { event_type: &'static str },
}

/// Per-message logic of the validation consumer.
///
/// decode → evaluate the total → move the stored order out of `Pending` →
/// publish the verdict on the status channel.
pub struct OrderValidationHandler {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    policy: ValidationPolicy,
    metrics: Arc<Metrics>,
}

impl OrderValidationHandler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        policy: ValidationPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            policy,
            metrics,
        }
    }

    /// `Err` means the message was not processed. Whether it should be seen
    /// again is decided by [`should_redeliver`].
    pub async fn handle(&self, payload: &[u8]) -> Result<Handled, OrderError> {
        // Observed on drop, whichever way this returns.
        let _timer = self.metrics.order_process_duration.start_timer();

        let event = OrderEvent::decode(payload).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode OrderCreated payload");
            e
        })?;

        let created = match event {
            OrderEvent::Created(created) => created,
            other => {
                tracing::warn!(
                    event_type = other.event_type(),
                    order_id = %other.order_id(),
                    "Skipping non-creation event on the creation channel"
                );
                return Ok(Handled::Ignored {
                    event_type: other.event_type(),
                });
            }
        };

        tracing::info!(
            order_id = %created.order_id,
            user_id = %created.user_id,
            restaurant_id = %created.restaurant_id,
            total_amount = %created.total_amount,
            "Processing OrderCreated"
        );

        let verdict = self.policy.evaluate(created.total_amount);
        if let Verdict::Failed(reason) = verdict {
            tracing::warn!(
                order_id = %created.order_id,
                amount = %created.total_amount,
                reason = %reason,
                "Order rejected"
            );
        }

        let transition = self
            .store
            .transition_status(created.order_id, OrderStatus::Pending, verdict.status())
            .await
            .map_err(|e| {
                if matches!(e, OrderError::Persistence(_)) {
                    self.metrics.db_errors.inc();
                }
                tracing::error!(
                    error = %e,
                    order_id = %created.order_id,
                    "Failed to update order status"
                );
                e
            })?;

        if let Transition::Skipped { current } = transition {
            tracing::info!(
                order_id = %created.order_id,
                status = %current,
                "Order already settled, not publishing again"
            );
            return Ok(Handled::AlreadySettled {
                order_id: created.order_id,
                status: current,
            });
        }

        let (result_event, handled) = match verdict {
            Verdict::Confirmed => {
                self.metrics.orders_confirmed.inc();
                (
                    OrderEvent::confirmed(created.order_id),
                    Handled::Confirmed {
                        order_id: created.order_id,
                    },
                )
            }
            Verdict::Failed(reason) => {
                self.metrics.orders_failed.inc();
                (
                    OrderEvent::failed(created.order_id, reason.to_string()),
                    Handled::Failed {
                        order_id: created.order_id,
                        reason: reason.to_string(),
                    },
                )
            }
        };

        // The status is already stored; a lost result event is logged, not retried.
        if let Err(e) = self.publisher.publish_event(&result_event).await {
            self.metrics.kafka_errors.inc();
            tracing::error!(
                error = %e,
                order_id = %created.order_id,
                event_type = result_event.event_type(),
                "Failed to publish validation result"
            );
        }

        Ok(handled)
    }
}

/// Only store failures are worth seeing again: the same bytes will fail to
/// decode every time, and a missing order will not appear later.
pub fn should_redeliver(error: &OrderError) -> bool {
    matches!(error, OrderError::Persistence(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{NewOrderItem, Order};
    use crate::messaging::{RecordingPublisher, ORDER_STATUS_TOPIC};
    use crate::store::InMemoryOrderStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryOrderStore>,
        publisher: Arc<RecordingPublisher>,
        metrics: Arc<Metrics>,
        handler: OrderValidationHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderValidationHandler::new(
            store.clone(),
            publisher.clone(),
            ValidationPolicy::default(),
            metrics.clone(),
        );
        Fixture {
            store,
            publisher,
            metrics,
            handler,
        }
    }

    async fn stored_order(store: &InMemoryOrderStore, price: Decimal) -> Order {
        let order = Order::create(
            "u1",
            "r1",
            vec![NewOrderItem::new("sku-1", "Chole Bhature", price, 1).into_item()],
        )
        .unwrap();
        store.create(&order).await.unwrap();
        order
    }

    fn created_payload(order: &Order) -> Vec<u8> {
        OrderEvent::created(order).encode().unwrap()
    }

    #[tokio::test]
    async fn test_confirms_valid_total() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(250)).await;

        let handled = f.handler.handle(&created_payload(&order)).await.unwrap();

        assert_eq!(handled, Handled::Confirmed { order_id: order.id });
        let stored = f.store.get(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.version, 2);

        let published = f.publisher.on_topic(ORDER_STATUS_TOPIC);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key, order.id.to_string());
        assert!(matches!(published[0].decode().unwrap(), OrderEvent::Confirmed(_)));
        assert_eq!(f.metrics.orders_confirmed.get(), 1);
    }

    #[tokio::test]
    async fn test_fails_low_total_with_reason() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(45)).await;

        let handled = f.handler.handle(&created_payload(&order)).await.unwrap();

        assert_eq!(
            handled,
            Handled::Failed {
                order_id: order.id,
                reason: "amount too low".to_string()
            }
        );
        let published = f.publisher.on_topic(ORDER_STATUS_TOPIC);
        let OrderEvent::Failed(failed) = published[0].decode().unwrap() else {
            panic!("expected a failure event");
        };
        assert_eq!(failed.reason, "amount too low");
        assert_eq!(f.metrics.orders_failed.get(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_not_redelivered() {
        let f = fixture();

        let err = f.handler.handle(b"{not json").await.unwrap_err();

        assert!(matches!(err, OrderError::Serialization(_)));
        assert!(!should_redeliver(&err));
        assert!(f.publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_every_outcome_is_timed() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(250)).await;
        let payload = created_payload(&order);

        f.handler.handle(&payload).await.unwrap();
        f.handler.handle(&payload).await.unwrap();
        f.handler.handle(b"{not json").await.unwrap_err();
        f.handler
            .handle(&OrderEvent::confirmed(order.id).encode().unwrap())
            .await
            .unwrap();

        assert_eq!(f.metrics.order_process_duration.get_sample_count(), 4);
    }

    #[tokio::test]
    async fn test_store_failure_is_redelivered_without_publishing() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(250)).await;
        f.store.fail_next_writes(1);

        let err = f.handler.handle(&created_payload(&order)).await.unwrap_err();

        assert!(should_redeliver(&err));
        assert!(f.publisher.messages().is_empty());
        assert_eq!(f.store.get(order.id).await.unwrap().status, OrderStatus::Pending);
        assert_eq!(f.metrics.db_errors.get(), 1);

        // Redelivery after the store recovers goes through.
        let handled = f.handler.handle(&created_payload(&order)).await.unwrap();
        assert_eq!(handled, Handled::Confirmed { order_id: order.id });
        assert_eq!(f.publisher.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_redelivered_event_publishes_once() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(250)).await;
        let payload = created_payload(&order);

        f.handler.handle(&payload).await.unwrap();
        let second = f.handler.handle(&payload).await.unwrap();

        assert_eq!(
            second,
            Handled::AlreadySettled {
                order_id: order.id,
                status: OrderStatus::Confirmed
            }
        );
        assert_eq!(f.publisher.messages().len(), 1);
        assert_eq!(f.store.get(order.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_redelivered() {
        let f = fixture();
        let order = Order::create(
            "u1",
            "r1",
            vec![NewOrderItem::new("sku-1", "Vada", dec!(150), 1).into_item()],
        )
        .unwrap();

        let err = f.handler.handle(&created_payload(&order)).await.unwrap_err();

        assert!(matches!(err, OrderError::NotFound(_)));
        assert!(!should_redeliver(&err));
    }

    #[tokio::test]
    async fn test_publish_failure_still_settles_order() {
        let f = fixture();
        let order = stored_order(&f.store, dec!(250)).await;
        f.publisher.set_unavailable(true);

        let handled = f.handler.handle(&created_payload(&order)).await.unwrap();

        assert_eq!(handled, Handled::Confirmed { order_id: order.id });
        assert_eq!(f.store.get(order.id).await.unwrap().status, OrderStatus::Confirmed);
        assert_eq!(f.metrics.kafka_errors.get(), 1);
    }

    #[tokio::test]
    async fn test_status_events_are_ignored() {
        let f = fixture();
        let payload = OrderEvent::confirmed(Uuid::new_v4()).encode().unwrap();

        let handled = f.handler.handle(&payload).await.unwrap();

        assert_eq!(
            handled,
            Handled::Ignored {
                event_type: "OrderConfirmed"
            }
        );
    }
}
