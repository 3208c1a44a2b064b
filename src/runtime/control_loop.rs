//! The batching state machine.
//!
//! A single task owns the accumulator, the deadline timer and the output sink.
//! It waits on the input source, the timer and control requests together and
//! reacts to whichever is ready first.

use super::sink::OutputSink;
use super::timer::DeadlineTimer;
use crate::utils::Accumulator;
use crate::{Batch, BatchLimits, BatcherMetrics, BatcherResult, FlushReason, ItemSource};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Requests sent from a [`BatcherHandle`](super::BatcherHandle) to its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Flush,
    Stop,
}

enum Event<T> {
    Item(T),
    SourceExhausted,
    TimerExpired,
    Command(Command),
    HandlesDropped,
}

/// Whether the loop keeps going after an event
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Close,
}

/// Totals reported when a batcher terminates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Items taken from the input source
    pub items_received: u64,
    /// Items delivered to the consumer inside batches
    pub items_emitted: u64,
    /// Batches flushed because they reached the size limit
    pub size_flushes: u64,
    /// Batches flushed because their first item reached the age limit
    pub age_flushes: u64,
    /// Batches flushed by an explicit `flush()`
    pub forced_flushes: u64,
    /// Final batch flushed while closing (0 or 1)
    pub closing_flushes: u64,
}

impl BatcherStats {
    /// Total number of batches emitted
    pub fn batches(&self) -> u64 {
        self.size_flushes + self.age_flushes + self.forced_flushes + self.closing_flushes
    }

    fn record(&mut self, reason: FlushReason, size: usize) {
        self.items_emitted += size as u64;
        match reason {
            FlushReason::Size => self.size_flushes += 1,
            FlushReason::Age => self.age_flushes += 1,
            FlushReason::Forced => self.forced_flushes += 1,
            FlushReason::Closing => self.closing_flushes += 1,
        }
    }
}

pub(crate) struct ControlLoop<T, S> {
    name: String,
    limits: BatchLimits,
    source: S,
    accumulator: Accumulator<T>,
    timer: DeadlineTimer,
    sink: OutputSink<T>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    first_item_at: Option<Instant>,
    metrics: BatcherMetrics,
    stats: BatcherStats,
}

impl<T, S> ControlLoop<T, S>
where
    T: Send + 'static,
    S: ItemSource<T>,
{
    pub(crate) fn new(
        name: String,
        limits: BatchLimits,
        source: S,
        accumulator: Accumulator<T>,
        sink: OutputSink<T>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let metrics = BatcherMetrics::new(name.clone());
        Self {
            name,
            limits,
            source,
            accumulator,
            timer: DeadlineTimer::new(),
            sink,
            commands,
            commands_open: true,
            first_item_at: None,
            metrics,
            stats: BatcherStats::default(),
        }
    }

    /// Run until the source is exhausted, `stop()` is requested or the consumer goes away
    pub(crate) async fn run(mut self) -> BatcherStats {
        info!(
            batcher = %self.name,
            max_size = self.limits.size(),
            max_age_ms = self.limits.age().as_millis() as u64,
            "Batcher started"
        );

        let outcome = self.process_events().await;
        // Requests arriving from here on are rejected instead of silently ignored.
        self.commands.close();
        let outcome = match outcome {
            Ok(()) => self.flush(FlushReason::Closing).await,
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            warn!(
                batcher = %self.name,
                "Batcher aborted, in-flight batch dropped: {}", e
            );
        }

        self.close();
        info!(
            batcher = %self.name,
            items = self.stats.items_received,
            batches = self.stats.batches(),
            "Batcher closed"
        );
        self.stats
    }

    async fn process_events(&mut self) -> BatcherResult<()> {
        loop {
            let event = self.next_event().await;
            if self.handle_event(event).await? == Step::Close {
                return Ok(());
            }
        }
    }

    /// Wait for whichever of command, deadline or item comes first
    ///
    /// Commands win ties so `stop()` is not starved by a busy source, and the
    /// deadline wins over a new item so a due batch leaves before the item is added.
    async fn next_event(&mut self) -> Event<T> {
        tokio::select! {
            biased;

            command = self.commands.recv(), if self.commands_open => match command {
                Some(command) => Event::Command(command),
                None => Event::HandlesDropped,
            },
            _ = self.timer.fired() => Event::TimerExpired,
            item = self.source.next_item() => match item {
                Some(item) => Event::Item(item),
                None => Event::SourceExhausted,
            },
        }
    }

    async fn handle_event(&mut self, event: Event<T>) -> BatcherResult<Step> {
        match event {
            Event::Item(item) => {
                if self.append(item) >= self.accumulator.capacity() {
                    self.flush(FlushReason::Size).await?;
                }
            }
            Event::TimerExpired => {
                // No-op while idle.
                self.flush(FlushReason::Age).await?;
            }
            Event::Command(Command::Flush) => {
                self.flush(FlushReason::Forced).await?;
            }
            Event::Command(Command::Stop) => {
                debug!(batcher = %self.name, "Stop requested");
                return Ok(Step::Close);
            }
            Event::SourceExhausted => {
                debug!(batcher = %self.name, "Input source exhausted");
                return Ok(Step::Close);
            }
            Event::HandlesDropped => {
                trace!(batcher = %self.name, "All handles dropped, running until source ends");
                self.commands_open = false;
            }
        }
        Ok(Step::Continue)
    }

    /// Buffer an item and return the new length
    fn append(&mut self, item: T) -> usize {
        // Only the first item after emptiness starts the age clock.
        if self.accumulator.is_empty() {
            self.timer.arm(self.limits.age());
            self.first_item_at = Some(Instant::now());
        }

        let len = self.accumulator.append(item);
        self.stats.items_received += 1;
        self.metrics.record_received();
        self.metrics.set_buffered(len);
        trace!(batcher = %self.name, buffered = len, "Item buffered");
        len
    }

    /// Drain and publish whatever is buffered; no-op when empty
    async fn flush(&mut self, reason: FlushReason) -> BatcherResult<()> {
        self.timer.disarm();
        if self.accumulator.is_empty() {
            return Ok(());
        }

        let items = self.accumulator.drain();
        let first_item_at = self.first_item_at.take().unwrap_or_else(Instant::now);
        let size = items.len();
        let age = first_item_at.elapsed();
        self.metrics.set_buffered(0);

        debug!(
            batcher = %self.name,
            reason = %reason,
            size,
            age_ms = age.as_millis() as u64,
            "Flushing batch"
        );

        let publish_start = Instant::now();
        self.sink
            .publish(Batch::new(items, reason, first_item_at))
            .await?;
        self.metrics.record_publish_wait(publish_start.elapsed());
        self.metrics.record_batch(reason, size, age);
        self.stats.record(reason, size);
        Ok(())
    }

    fn close(&mut self) {
        self.timer.disarm();
        self.sink.seal();
        debug_assert!(!self.timer.is_armed() && self.sink.is_sealed());
    }
}
