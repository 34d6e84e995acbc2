//! Prometheus metrics for the delivery engine.
//!
//! Metrics live in a private [`Registry`] so several queues (and tests) can
//! each own a set without colliding in the global default registry.

use crate::events::{DeliveryEvent, DeliveryObserver};
use crate::queue::QueueStats;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Delivery metrics for observability
#[derive(Debug)]
pub struct DeliveryMetrics {
    registry: Registry,

    // Job lifecycle
    pub jobs_queued_total: IntCounter,
    pub delivery_attempts_total: IntCounter,
    pub deliveries_succeeded_total: IntCounter,
    pub delivery_retries_total: IntCounter,
    pub deliveries_failed_total: IntCounter,
    pub jobs_cleared_total: IntCounter,
    pub responses_by_status: IntCounterVec,

    // Queue state, refreshed from QueueStats
    pub queue_depth: IntGauge,
    pub delayed_retries: IntGauge,
    pub in_flight: IntGauge,
    pub window_requests: IntGauge,

    // Inbound endpoint
    pub inbound_requests_total: IntCounterVec,
}

impl DeliveryMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("cms_bridge".to_string()), None)?;

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };
        let gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let gauge = IntGauge::new(name, help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };
        let counter_vec =
            |name: &str, help: &str, labels: &[&str]| -> Result<IntCounterVec, prometheus::Error> {
                let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
                registry.register(Box::new(counter.clone()))?;
                Ok(counter)
            };

        Ok(Arc::new(Self {
            jobs_queued_total: counter("jobs_queued_total", "Webhook jobs accepted into the queue")?,
            delivery_attempts_total: counter(
                "delivery_attempts_total",
                "Webhook delivery attempts dispatched",
            )?,
            deliveries_succeeded_total: counter(
                "deliveries_succeeded_total",
                "Webhook deliveries acknowledged with 2xx",
            )?,
            delivery_retries_total: counter(
                "delivery_retries_total",
                "Failed attempts scheduled for retry",
            )?,
            deliveries_failed_total: counter(
                "deliveries_failed_total",
                "Webhook jobs that failed permanently",
            )?,
            jobs_cleared_total: counter(
                "jobs_cleared_total",
                "Waiting jobs rejected by a queue clear",
            )?,
            responses_by_status: counter_vec(
                "responses_by_status_total",
                "Successful delivery responses by HTTP status",
                &["status"],
            )?,
            queue_depth: gauge("queue_depth", "Jobs waiting for dispatch")?,
            delayed_retries: gauge("delayed_retries", "Jobs waiting out a retry delay")?,
            in_flight: gauge("in_flight", "Deliveries currently in flight")?,
            window_requests: gauge(
                "window_requests",
                "Requests sent in the current rate-limit window",
            )?,
            inbound_requests_total: counter_vec(
                "inbound_requests_total",
                "Inbound webhook requests by source and result",
                &["source", "result"],
            )?,
            registry,
        }))
    }

    /// Copy a queue snapshot into the gauges
    pub fn observe_stats(&self, stats: &QueueStats) {
        self.queue_depth.set(stats.queued as i64);
        self.delayed_retries.set(stats.delayed as i64);
        self.in_flight.set(stats.in_flight as i64);
        self.window_requests.set(stats.sent_this_window as i64);
    }

    pub fn record_inbound(&self, source: &str, result: &str) {
        self.inbound_requests_total
            .with_label_values(&[source, result])
            .inc();
    }

    /// Text exposition format for `/metrics`
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl DeliveryObserver for DeliveryMetrics {
    fn on_event(&self, event: &DeliveryEvent) {
        match event {
            DeliveryEvent::Queued { .. } => self.jobs_queued_total.inc(),
            DeliveryEvent::Dispatched { .. } => self.delivery_attempts_total.inc(),
            DeliveryEvent::Succeeded { status, .. } => {
                self.deliveries_succeeded_total.inc();
                self.responses_by_status
                    .with_label_values(&[&status.to_string()])
                    .inc();
            }
            DeliveryEvent::Retrying { .. } => self.delivery_retries_total.inc(),
            DeliveryEvent::Failed { .. } => self.deliveries_failed_total.inc(),
            DeliveryEvent::QueueCleared { rejected } => {
                self.jobs_cleared_total.inc_by(*rejected as u64)
            }
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
