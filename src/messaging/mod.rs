// ============================================================================
// Messaging - event bus ports and their Redpanda/Kafka adapters
// ============================================================================
//
// Producer side: `EventPublisher` is what the creation path and the
// validation handler publish through. Every message is keyed by order id so
// all events of one order share a partition and keep their publish order.
//
// Consumer side: `ValidationConsumer` drives one read loop per process over
// the creation channel; `OrderValidationHandler` holds the per-message logic
// so it can be exercised without a broker.
//
// ============================================================================

mod consumer;
mod handler;
mod memory;
mod redpanda;

use async_trait::async_trait;

use crate::domain::order::{OrderError, OrderEvent};

pub use crate::domain::order::{ORDERS_TOPIC, ORDER_STATUS_TOPIC};
pub use consumer::{Cancelled, ValidationConsumer, ValidationConsumerConfig};
pub use handler::{should_redeliver, Handled, OrderValidationHandler};
pub use memory::{PublishedMessage, RecordingPublisher};
pub use redpanda::RedpandaClient;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), OrderError>;

    /// Encode `event` and publish it on its channel, keyed by order id.
    async fn publish_event(&self, event: &OrderEvent) -> Result<(), OrderError> {
        let payload = event.encode()?;
        let key = event.order_id().to_string();
        self.publish(event.topic(), &key, &payload).await
    }
}
