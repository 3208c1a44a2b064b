//! Simple batcher example
//!
//! Feeds a handful of numbers through a batcher and prints the batches.
//! The source closes before the size or age limit is reached, so everything
//! arrives as one final batch.
//!
//! Usage:
//!   cargo run --example simple_batcher
//!
//! Limits can also come from the environment:
//!   BATCH_MAX_SIZE=2 BATCH_MAX_AGE_MS=50 cargo run --example simple_batcher

use chanbatch::{Batcher, BatcherConfig, BatcherResult};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> BatcherResult<()> {
    let mut config = BatcherConfig {
        name: "simple-batcher".to_string(),
        ..BatcherConfig::default()
    };
    config.batching.max_size = 10;
    config.batching.max_age_ms = 100;
    config.apply_env_overrides()?;

    let (tx, rx) = mpsc::channel(10);
    let mut handle = Batcher::from_config(&config)?.spawn(rx);
    let mut batches = handle.results()?;

    for i in 1..=3 {
        if tx.send(i).await.is_err() {
            break;
        }
    }
    // Closing the source flushes what is left and ends the results stream.
    drop(tx);

    while let Some(batch) = batches.recv().await {
        let reason = batch.reason();
        println!("{:?} ({})", batch.into_inner(), reason);
    }

    let stats = handle.wait().await;
    println!(
        "{} items in {} batch(es)",
        stats.items_received,
        stats.batches()
    );
    Ok(())
}
