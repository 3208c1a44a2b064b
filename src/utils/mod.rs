//! Building blocks shared by the batcher runtime.

pub mod accumulator;

pub use accumulator::{Accumulator, AccumulatorView};
