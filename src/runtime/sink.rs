//! Output side of a batcher: rendezvous hand-off of batches to the consumer.

use crate::{Batch, BatcherError, BatcherResult};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// A batch in flight together with the consumer's receipt
struct Delivery<T> {
    batch: Batch<T>,
    receipt: oneshot::Sender<()>,
}

impl<T> Delivery<T> {
    fn accept(self) -> Batch<T> {
        // The publisher may already be gone (loop aborted); the batch is still ours.
        let _ = self.receipt.send(());
        self.batch
    }
}

/// Create a connected sink / results pair
pub(crate) fn output_channel<T>() -> (OutputSink<T>, Results<T>) {
    let (tx, rx) = mpsc::channel(1);
    (OutputSink { tx: Some(tx) }, Results { rx })
}

/// Publishing end, owned by the control loop
pub(crate) struct OutputSink<T> {
    tx: Option<mpsc::Sender<Delivery<T>>>,
}

impl<T> OutputSink<T> {
    /// Hand a batch to the consumer
    ///
    /// Completes only once the consumer has taken the batch, so a slow consumer
    /// holds up the caller. Fails if the sink is sealed or the consumer went away.
    pub(crate) async fn publish(&mut self, batch: Batch<T>) -> BatcherResult<()> {
        let tx = self.tx.as_ref().ok_or(BatcherError::Closed)?;
        let (receipt, accepted) = oneshot::channel();

        tx.send(Delivery { batch, receipt })
            .await
            .map_err(|_| BatcherError::ConsumerDisconnected)?;
        accepted
            .await
            .map_err(|_| BatcherError::ConsumerDisconnected)
    }

    /// Close the sink; the consumer sees end of stream after the last batch
    pub(crate) fn seal(&mut self) {
        self.tx = None;
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Ordered stream of batches produced by a batcher
///
/// Read with [`Results::recv`] or as a `futures::Stream` until it returns `None`,
/// which happens exactly once: after the final batch, when the batcher closes.
pub struct Results<T> {
    rx: mpsc::Receiver<Delivery<T>>,
}

impl<T> Results<T> {
    /// Receive the next batch, or `None` once the batcher has closed
    pub async fn recv(&mut self) -> Option<Batch<T>> {
        self.rx.recv().await.map(Delivery::accept)
    }
}

impl<T> Stream for Results<T> {
    type Item = Batch<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|delivery| delivery.map(Delivery::accept))
    }
}

impl<T> std::fmt::Debug for Results<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlushReason;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::Instant;

    fn batch(items: Vec<u32>) -> Batch<u32> {
        Batch::new(items, FlushReason::Forced, Instant::now())
    }

    #[tokio::test]
    async fn test_publish_then_seal() {
        let (mut sink, mut results) = output_channel();

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(batch) = results.recv().await {
                seen.push(batch.into_inner());
            }
            seen
        });

        sink.publish(batch(vec![1, 2])).await.unwrap();
        sink.publish(batch(vec![3])).await.unwrap();
        sink.seal();
        assert!(sink.is_sealed());

        assert_eq!(consumer.await.unwrap(), vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_waits_for_consumer() {
        let (mut sink, mut results) = output_channel();

        let publisher = tokio::spawn(async move { sink.publish(batch(vec![1])).await });

        // Nobody is reading yet: the hand-off does not complete.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!publisher.is_finished());

        let received = results.recv().await.unwrap();
        assert_eq!(received, vec![1]);
        assert!(publisher.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_publish_after_consumer_dropped() {
        let (mut sink, results) = output_channel();
        drop(results);

        let err = sink.publish(batch(vec![1])).await.unwrap_err();
        assert_eq!(err, BatcherError::ConsumerDisconnected);
    }

    #[tokio::test]
    async fn test_publish_after_seal() {
        let (mut sink, _results) = output_channel::<u32>();
        sink.seal();

        let err = sink.publish(batch(vec![1])).await.unwrap_err();
        assert_eq!(err, BatcherError::Closed);
    }

    #[tokio::test]
    async fn test_results_as_stream() {
        let (mut sink, results) = output_channel();

        tokio::spawn(async move {
            sink.publish(batch(vec![7])).await.unwrap();
            sink.publish(batch(vec![8, 9])).await.unwrap();
        });

        let all: Vec<Vec<u32>> = results.map(Batch::into_inner).collect().await;
        assert_eq!(all, vec![vec![7], vec![8, 9]]);
    }
}
