//! Metrics and observability for batchers.

use crate::FlushReason;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metrics collector for a single batcher
#[derive(Debug, Clone)]
pub struct BatcherMetrics {
    /// Batcher name for labeling
    batcher: String,
}

impl BatcherMetrics {
    /// Create a new metrics collector
    pub fn new(batcher: impl Into<String>) -> Self {
        Self::register_metrics();

        Self {
            batcher: batcher.into(),
        }
    }

    /// Register metric descriptions
    fn register_metrics() {
        // Counters
        describe_counter!(
            "batcher_items_received_total",
            "Total number of items taken from the input source"
        );
        describe_counter!(
            "batcher_batches_emitted_total",
            "Total number of batches published, by flush reason"
        );

        // Histograms
        describe_histogram!("batcher_batch_size", "Number of items in each batch");
        describe_histogram!(
            "batcher_batch_age_seconds",
            "Time from the first buffered item to the flush of its batch"
        );
        describe_histogram!(
            "batcher_publish_wait_seconds",
            "Time spent waiting for the consumer to take a batch"
        );

        // Gauges
        describe_gauge!(
            "batcher_buffered_items",
            "Current number of items waiting to be flushed"
        );
    }

    /// Record an item taken from the source
    pub fn record_received(&self) {
        counter!(
            "batcher_items_received_total",
            "batcher" => self.batcher.clone(),
        )
        .increment(1);
    }

    /// Record a published batch
    pub fn record_batch(&self, reason: FlushReason, size: usize, age: Duration) {
        counter!(
            "batcher_batches_emitted_total",
            "batcher" => self.batcher.clone(),
            "reason" => reason.as_str(),
        )
        .increment(1);

        histogram!(
            "batcher_batch_size",
            "batcher" => self.batcher.clone(),
        )
        .record(size as f64);

        histogram!(
            "batcher_batch_age_seconds",
            "batcher" => self.batcher.clone(),
        )
        .record(age.as_secs_f64());
    }

    /// Record how long a publish blocked on the consumer
    pub fn record_publish_wait(&self, duration: Duration) {
        histogram!(
            "batcher_publish_wait_seconds",
            "batcher" => self.batcher.clone(),
        )
        .record(duration.as_secs_f64());
    }

    /// Set buffered item count
    pub fn set_buffered(&self, count: usize) {
        gauge!(
            "batcher_buffered_items",
            "batcher" => self.batcher.clone(),
        )
        .set(count as f64);
    }
}
