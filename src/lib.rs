//! # chanbatch
//!
//! Size- and age-bounded batching of asynchronous item streams.
//!
//! A batcher takes items from a single input source and releases them to a
//! consumer in ordered batches. A batch is flushed when it reaches the size limit,
//! or when its first item has waited for the age limit, whichever comes first.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chanbatch::{BatchLimits, Batcher, BatcherResult};
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> BatcherResult<()> {
//! let (tx, rx) = mpsc::channel::<String>(64);
//! let limits = BatchLimits::new(100, Duration::from_millis(250))?;
//!
//! let mut handle = Batcher::new(limits).with_name("audit-log").spawn(rx);
//! let mut batches = handle.results()?;
//!
//! tokio::spawn(async move {
//!     for i in 0..1_000 {
//!         tx.send(format!("event-{}", i)).await.unwrap();
//!     }
//! });
//!
//! while let Some(batch) = batches.recv().await {
//!     println!("{} events ({})", batch.len(), batch.reason());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Age counted from the first item**: the deadline starts when an empty buffer
//!   receives an item, not at construction and not at the previous flush
//! - **Backpressure**: publishing waits until the consumer takes the batch, so a
//!   slow consumer stalls the batcher instead of growing a queue
//! - **Never loses items**: when the source is exhausted or `stop()` is called,
//!   the remaining items go out as a final batch before the stream closes
//! - **Observability**: structured logging with `tracing` and metrics via `metrics`
//! - **Configuration**: TOML file and environment variable based configuration

mod batch;
mod config;
mod error;
mod metrics;
mod runtime;
mod traits;
pub mod utils;

// Re-export public API
pub use batch::{Batch, FlushReason};
pub use config::{BatchLimits, BatchSettings, BatcherConfig};
pub use error::{BatcherError, BatcherResult};
pub use self::metrics::BatcherMetrics;
pub use runtime::{batched, Batcher, BatcherHandle, BatcherStats, Results};
pub use traits::{ItemSource, StreamSource};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
