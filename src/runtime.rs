//! Runtime for running batchers.
//!
//! A batcher is one tokio task running the control loop:
//! - `DeadlineTimer`: age deadline of the batch being accumulated
//! - `OutputSink` / `Results`: rendezvous hand-off of batches to the consumer
//! - `ControlLoop`: the state machine deciding when to flush
//!
//! `Batcher` starts the task and `BatcherHandle` controls it.

mod control_loop;
mod handle;
mod sink;
mod timer;

pub use control_loop::BatcherStats;
pub use handle::{batched, Batcher, BatcherHandle};
pub use sink::Results;
