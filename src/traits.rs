//! Input source trait definitions.
//!
//! A batcher pulls items from an [`ItemSource`]. Implementations are provided for
//! tokio channel receivers and, through [`StreamSource`], for any `futures::Stream`.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Producer side of a batcher
///
/// Yields items asynchronously and signals exhaustion by returning `None`.
///
/// # Cancellation
///
/// The control loop waits on `next_item` together with its timer and control
/// requests, and drops the pending future when one of those wins. Implementations
/// must be cancel safe: dropping the future before it completes must not lose an item.
/// Channel receivers and `StreamExt::next` both satisfy this.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use chanbatch::ItemSource;
///
/// struct Countdown(u32);
///
/// #[async_trait]
/// impl ItemSource<u32> for Countdown {
///     async fn next_item(&mut self) -> Option<u32> {
///         if self.0 == 0 {
///             return None;
///         }
///         self.0 -= 1;
///         Some(self.0)
///     }
/// }
/// ```
#[async_trait]
pub trait ItemSource<T>: Send {
    /// Wait for the next item
    ///
    /// Returns `None` once the source is exhausted. After that the source is never
    /// polled again.
    async fn next_item(&mut self) -> Option<T>;
}

#[async_trait]
impl<T: Send> ItemSource<T> for mpsc::Receiver<T> {
    async fn next_item(&mut self) -> Option<T> {
        self.recv().await
    }
}

#[async_trait]
impl<T: Send> ItemSource<T> for mpsc::UnboundedReceiver<T> {
    async fn next_item(&mut self) -> Option<T> {
        self.recv().await
    }
}

/// Adapter turning any `futures::Stream` into an [`ItemSource`]
#[derive(Debug)]
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S> {
    /// Wrap a stream
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> ItemSource<S::Item> for StreamSource<S>
where
    S: Stream + Unpin + Send,
    S::Item: Send,
{
    async fn next_item(&mut self) -> Option<S::Item> {
        self.stream.next().await
    }
}
