use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::EventPublisher;
use crate::domain::order::{OrderError, OrderEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn decode(&self) -> Result<OrderEvent, OrderError> {
        OrderEvent::decode(&self.payload)
    }
}

/// Keeps every published message in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    unavailable: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail, as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.lock().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<PublishedMessage> {
        self.lock().iter().filter(|m| m.topic == topic).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PublishedMessage>> {
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), OrderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OrderError::Publish(format!("broker unavailable for {topic}")));
        }

        self.lock().push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{ORDERS_TOPIC, ORDER_STATUS_TOPIC};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_event_keys_by_order_id() {
        let publisher = RecordingPublisher::new();
        let order_id = Uuid::new_v4();

        publisher.publish_event(&OrderEvent::confirmed(order_id)).await.unwrap();

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, ORDER_STATUS_TOPIC);
        assert_eq!(messages[0].key, order_id.to_string());
        assert_eq!(messages[0].decode().unwrap().order_id(), order_id);
    }

    #[tokio::test]
    async fn test_unavailable_publisher_records_nothing() {
        let publisher = RecordingPublisher::new();
        publisher.set_unavailable(true);

        let result = publisher.publish(ORDERS_TOPIC, "k", b"{}").await;

        assert!(matches!(result, Err(OrderError::Publish(_))));
        assert!(publisher.messages().is_empty());
    }
}
