//! Public entry points for starting and controlling a batcher.

use super::control_loop::{BatcherStats, Command, ControlLoop};
use super::sink::{output_channel, Results};
use crate::utils::{Accumulator, AccumulatorView};
use crate::{BatchLimits, BatcherConfig, BatcherError, BatcherResult, ItemSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Builder for a batcher
///
/// Create with [`Batcher::new`] from validated limits, or with
/// [`Batcher::from_config`], then start it with [`Batcher::spawn`].
#[derive(Debug, Clone)]
pub struct Batcher {
    name: String,
    limits: BatchLimits,
}

impl Batcher {
    /// Create a batcher with the given limits
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            name: "batcher".to_string(),
            limits,
        }
    }

    /// Create a batcher from configuration
    ///
    /// Validates the configuration and initializes tracing with its log level.
    pub fn from_config(config: &BatcherConfig) -> BatcherResult<Self> {
        config.validate()?;

        Self::init_tracing(config);
        info!("Batcher configured: {}", config.name);

        Ok(Self::new(config.limits()?).with_name(config.name.clone()))
    }

    /// Set the name used in logs and metric labels
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Start the control loop on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn<T, S>(self, source: S) -> BatcherHandle<T>
    where
        T: Send + 'static,
        S: ItemSource<T> + 'static,
    {
        let accumulator = Accumulator::new(self.limits.size());
        let view = accumulator.view();
        let (sink, results) = output_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let control = ControlLoop::new(
            self.name,
            self.limits,
            source,
            accumulator,
            sink,
            commands_rx,
        );
        let task = tokio::spawn(control.run());

        BatcherHandle {
            commands: commands_tx,
            view,
            limits: self.limits,
            results: Some(results),
            stopped: AtomicBool::new(false),
            task,
        }
    }

    /// Initialize tracing/logging
    fn init_tracing(config: &BatcherConfig) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .ok(); // Ignore if already initialized
    }
}

/// Batch `source` into batches of at most `size` items, each held no longer than `age`
///
/// Returns just the results stream; the batcher closes it once `source` is exhausted.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> chanbatch::BatcherResult<()> {
/// use std::time::Duration;
/// use tokio::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel(10);
/// let mut batches = chanbatch::batched(rx, 10, Duration::from_millis(100))?;
///
/// tx.send(1).await.unwrap();
/// tx.send(2).await.unwrap();
/// tx.send(3).await.unwrap();
/// drop(tx);
///
/// while let Some(batch) = batches.recv().await {
///     println!("{:?}", batch.into_inner()); // [1, 2, 3]
/// }
/// # Ok(())
/// # }
/// ```
pub fn batched<T, S>(source: S, size: usize, age: Duration) -> BatcherResult<Results<T>>
where
    T: Send + 'static,
    S: ItemSource<T> + 'static,
{
    let mut handle = Batcher::new(BatchLimits::new(size, age)?).spawn(source);
    handle.results()
}

/// Control handle for a running batcher
///
/// Dropping the handle does not stop the batcher; it keeps running until its
/// source is exhausted. If the results stream was never taken it is dropped with
/// the handle, which ends the batcher at its next publish.
pub struct BatcherHandle<T> {
    commands: mpsc::UnboundedSender<Command>,
    view: AccumulatorView,
    limits: BatchLimits,
    results: Option<Results<T>>,
    stopped: AtomicBool,
    task: JoinHandle<BatcherStats>,
}

impl<T> BatcherHandle<T> {
    /// Take the ordered stream of batches
    ///
    /// Can be taken once; later calls return [`BatcherError::ResultsTaken`].
    pub fn results(&mut self) -> BatcherResult<Results<T>> {
        self.results.take().ok_or(BatcherError::ResultsTaken)
    }

    /// Current number of buffered items
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Check if the buffer is at the size limit
    pub fn is_full(&self) -> bool {
        self.view.is_full()
    }

    /// Limits this batcher was started with
    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Request an out-of-schedule flush of whatever is buffered
    ///
    /// A no-op when nothing is buffered. The next item starts a fresh age clock.
    /// Returns [`BatcherError::Closed`] once the batcher has terminated.
    pub fn flush(&self) -> BatcherResult<()> {
        self.commands
            .send(Command::Flush)
            .map_err(|_| BatcherError::Closed)
    }

    /// Stop the batcher: flush what is buffered, then close the results stream
    ///
    /// Items still queued in the source are not read. A second call returns
    /// [`BatcherError::AlreadyStopped`]; a call after the batcher closed on its
    /// own (source exhausted) returns [`BatcherError::Closed`], every time.
    /// Either way the batcher is unaffected.
    pub fn stop(&self) -> BatcherResult<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(BatcherError::AlreadyStopped);
        }

        self.commands.send(Command::Stop).map_err(|_| {
            // The request never reached the loop, so this handle did not stop it.
            self.stopped.store(false, Ordering::Release);
            BatcherError::Closed
        })
    }

    /// Check if the batcher no longer accepts requests
    ///
    /// Becomes true when the control loop starts closing, which is before the
    /// final batch is published and the results stream ends.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Wait for the control loop to terminate and return its totals
    ///
    /// The batches must be consumed concurrently, otherwise the final publish
    /// never completes. If the task was cancelled (its runtime shut down) the
    /// totals are lost and empty stats are returned.
    pub async fn wait(self) -> BatcherStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!("Batcher task did not complete, totals unavailable: {}", e);
                BatcherStats::default()
            }
        }
    }
}

impl<T> std::fmt::Debug for BatcherHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatcherHandle")
            .field("limits", &self.limits)
            .field("buffered", &self.view.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
