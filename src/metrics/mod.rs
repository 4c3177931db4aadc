// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

pub use server::metrics_handler;

// ============================================================================
// Metrics - Prometheus counters for the order pipeline
// ============================================================================
//
// Built once per process and handed to each component as `Arc<Metrics>`.
// Every process owns its own `Registry`; nothing is registered globally.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub orders_confirmed: IntCounter,
    pub orders_failed: IntCounter,
    pub order_process_duration: Histogram,
    pub kafka_errors: IntCounter,
    pub db_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total number of orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_confirmed =
            IntCounter::new("orders_confirmed_total", "Total number of orders confirmed")?;
        registry.register(Box::new(orders_confirmed.clone()))?;

        let orders_failed = IntCounter::new("orders_failed_total", "Total number of orders failed")?;
        registry.register(Box::new(orders_failed.clone()))?;

        let order_process_duration = Histogram::with_opts(
            HistogramOpts::new("order_process_duration_seconds", "Time taken to process orders")
                .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;
        registry.register(Box::new(order_process_duration.clone()))?;

        let kafka_errors = IntCounter::new("kafka_errors_total", "Total Kafka errors")?;
        registry.register(Box::new(kafka_errors.clone()))?;

        let db_errors = IntCounter::new("db_errors_total", "Total database errors")?;
        registry.register(Box::new(db_errors.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_confirmed,
            orders_failed,
            order_process_duration,
            kafka_errors,
            db_errors,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Option<f64> {
        metrics
            .registry()
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| m.metric.first().and_then(|m| m.counter.value))
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.registry().gather().len(), 6);
    }

    #[test]
    fn test_counters_are_per_instance() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.orders_created.inc();
        a.orders_created.inc();

        assert_eq!(counter_value(&a, "orders_created_total"), Some(2.0));
        assert_eq!(counter_value(&b, "orders_created_total"), Some(0.0));
    }
}
