use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    message::{Message, OwnedMessage},
    Offset, TopicPartitionList,
};
use tokio::sync::watch;

use super::handler::{should_redeliver, Handled, OrderValidationHandler};
use super::ORDERS_TOPIC;
use crate::domain::order::OrderError;
use crate::metrics::Metrics;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ValidationConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    /// Pause before a message whose store write failed is read again.
    pub redelivery_delay: Duration,
}

/// Returned by [`ValidationConsumer::run`] once the shutdown signal is seen.
#[derive(Debug, thiserror::Error)]
#[error("validation consumer cancelled")]
pub struct Cancelled;

/// What the loop does with a message's offset once the handler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Commit,
    Rewind,
}

fn disposition(result: &Result<Handled, OrderError>) -> Disposition {
    match result {
        Err(e) if should_redeliver(e) => Disposition::Rewind,
        _ => Disposition::Commit,
    }
}

/// Partitions whose seek back to a failed offset has not gone through yet.
///
/// While a partition is held, nothing at or past the failed offset may be
/// handled or committed there, otherwise the commit of a later offset would
/// acknowledge the failed one.
#[derive(Debug, Default)]
struct PendingRewinds {
    held: HashMap<(String, i32), i64>,
}

impl PendingRewinds {
    fn hold(&mut self, topic: &str, partition: i32, offset: i64) {
        self.held
            .entry((topic.to_string(), partition))
            .and_modify(|held| *held = (*held).min(offset))
            .or_insert(offset);
    }

    fn blocks(&self, topic: &str, partition: i32, offset: i64) -> bool {
        self.held
            .get(&(topic.to_string(), partition))
            .is_some_and(|held| offset >= *held)
    }

    fn release(&mut self, topic: &str, partition: i32) {
        self.held.remove(&(topic.to_string(), partition));
    }

    fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn entries(&self) -> Vec<(String, i32, i64)> {
        self.held
            .iter()
            .map(|((topic, partition), offset)| (topic.clone(), *partition, *offset))
            .collect()
    }
}

// ============================================================================
// Validation Consumer - single read loop over the creation channel
// ============================================================================
//
// One member of a consumer group. Partitions are owned by exactly one member
// at a time, so scale-out is by running more processes, never by fanning out
// inside this loop.
//
// Offsets are committed by hand once a message is done with: after it was
// handled, or after it was dropped as undecodable. A store failure leaves the
// offset alone and seeks the partition back, so the same message is read
// again. There is no retry ceiling.
//
// When that seek itself fails the partition is paused and held: the seek is
// retried every `redelivery_delay`, and until it succeeds no later offset of
// that partition is handled or committed.
//
// ============================================================================

pub struct ValidationConsumer {
    consumer: StreamConsumer,
    handler: OrderValidationHandler,
    metrics: Arc<Metrics>,
    redelivery_delay: Duration,
}

impl ValidationConsumer {
    pub fn new(
        config: &ValidationConsumerConfig,
        handler: OrderValidationHandler,
        metrics: Arc<Metrics>,
    ) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", "10000")
            .set("fetch.max.bytes", "10000000")
            .create()?;

        consumer.subscribe(&[ORDERS_TOPIC])?;

        Ok(Self {
            consumer,
            handler,
            metrics,
            redelivery_delay: config.redelivery_delay,
        })
    }

    /// Read and handle messages until `shutdown` flips to `true` or its
    /// sender goes away. A message already being handled is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), Cancelled> {
        tracing::info!(topic = ORDERS_TOPIC, "Validation consumer started");

        let mut pending = PendingRewinds::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !pending.is_empty() {
                self.retry_rewinds(&mut pending);
            }

            let received = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                // A paused partition delivers nothing, so wake up to retry its seek.
                _ = tokio::time::sleep(self.redelivery_delay), if !pending.is_empty() => continue,
                received = self.consumer.recv() => received.map(|m| m.detach()),
            };

            match received {
                Ok(message) => self.process(message, &mut pending).await,
                Err(e) => {
                    self.metrics.kafka_errors.inc();
                    tracing::error!(error = %e, "Failed to read message");
                }
            }
        }

        tracing::info!("Validation consumer stopping");
        Err(Cancelled)
    }

    async fn process(&self, message: OwnedMessage, pending: &mut PendingRewinds) {
        let topic = message.topic();
        let partition = message.partition();
        let offset = message.offset();

        if pending.blocks(topic, partition, offset) {
            tracing::debug!(topic, partition, offset, "Partition awaiting rewind, message left for redelivery");
            return;
        }

        let payload = message.payload().unwrap_or_default();
        tracing::debug!(topic, partition, offset, "Received message");

        let result = self.handler.handle(payload).await;
        match (disposition(&result), result) {
            (Disposition::Commit, Ok(handled)) => {
                tracing::debug!(topic, partition, offset, outcome = ?handled, "Message handled");
                self.commit(topic, partition, offset);
            }
            (Disposition::Commit, Err(e)) => {
                // No dead-letter sink: the message is acknowledged and lost.
                tracing::error!(
                    error = %e,
                    kind = e.kind(),
                    topic,
                    partition,
                    offset,
                    "Dropping unprocessable message"
                );
                self.commit(topic, partition, offset);
            }
            (Disposition::Rewind, outcome) => {
                if let Err(e) = &outcome {
                    tracing::warn!(
                        error = %e,
                        topic,
                        partition,
                        offset,
                        delay_ms = self.redelivery_delay.as_millis() as u64,
                        "Message left uncommitted, rewinding for redelivery"
                    );
                }
                if let Err(seek_err) = self.seek_back(topic, partition, offset) {
                    self.metrics.kafka_errors.inc();
                    tracing::error!(
                        error = %seek_err,
                        topic,
                        partition,
                        offset,
                        "Seek failed, holding partition until it succeeds"
                    );
                    self.pause(topic, partition);
                    pending.hold(topic, partition, offset);
                }
                tokio::time::sleep(self.redelivery_delay).await;
            }
        }
    }

    fn retry_rewinds(&self, pending: &mut PendingRewinds) {
        for (topic, partition, offset) in pending.entries() {
            match self.seek_back(&topic, partition, offset) {
                Ok(()) => {
                    tracing::info!(topic = %topic, partition, offset, "Partition rewound, resuming");
                    self.resume(&topic, partition);
                    pending.release(&topic, partition);
                }
                Err(e) => {
                    self.metrics.kafka_errors.inc();
                    tracing::warn!(error = %e, topic = %topic, partition, offset, "Seek retry failed");
                }
            }
        }
    }

    fn seek_back(&self, topic: &str, partition: i32, offset: i64) -> Result<(), KafkaError> {
        self.consumer
            .seek(topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
    }

    fn pause(&self, topic: &str, partition: i32) {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition(topic, partition);
        if let Err(e) = self.consumer.pause(&tpl) {
            self.metrics.kafka_errors.inc();
            tracing::error!(error = %e, topic, partition, "Failed to pause partition");
        }
    }

    fn resume(&self, topic: &str, partition: i32) {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition(topic, partition);
        if let Err(e) = self.consumer.resume(&tpl) {
            self.metrics.kafka_errors.inc();
            tracing::error!(error = %e, topic, partition, "Failed to resume partition");
        }
    }

    fn commit(&self, topic: &str, partition: i32, offset: i64) {
        let mut tpl = TopicPartitionList::new();
        let next = tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1));
        let result = next.and_then(|_| self.consumer.commit(&tpl, CommitMode::Async));

        if let Err(e) = result {
            self.metrics.kafka_errors.inc();
            tracing::error!(error = %e, topic, partition, offset, "Failed to commit offset");
        }
    }
}
