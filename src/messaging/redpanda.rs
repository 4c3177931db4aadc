use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use super::EventPublisher;
use crate::domain::order::OrderError;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka-protocol producer shared by both processes.
///
/// Writes wait for every in-sync replica (`acks=all`), payloads are snappy
/// compressed, and the partition is picked by hashing the message key.
pub struct RedpandaClient {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaClient {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("compression.type", "snappy")
            .set("partitioner", "murmur2_random")
            .create()?;

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }
}

#[async_trait]
impl EventPublisher for RedpandaClient {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), OrderError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(SEND_TIMEOUT))
                    .await
                    .map_err(|(e, _)| e)
            })
            .await;

        match result {
            Ok(delivery) => {
                tracing::info!(
                    topic = %topic,
                    key = %key,
                    delivery = ?delivery,
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err(CircuitBreakerError::Open) => {
                tracing::error!(
                    topic = %topic,
                    key = %key,
                    "Circuit breaker open - Redpanda unavailable"
                );
                Err(OrderError::Publish(format!(
                    "circuit breaker open, {topic} not published"
                )))
            }
            Err(CircuitBreakerError::Inner(e)) => {
                tracing::error!(
                    error = %e,
                    topic = %topic,
                    key = %key,
                    "Failed to publish to Redpanda"
                );
                Err(OrderError::Publish(e.to_string()))
            }
        }
    }
}
