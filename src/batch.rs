//! Batch value type emitted by a batcher.

use std::fmt;
use std::ops::Deref;
use tokio::time::Instant;

/// Why a batch was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// The buffer reached the size limit
    Size,
    /// The oldest buffered item reached the age limit
    Age,
    /// An explicit `flush()` request
    Forced,
    /// Final flush while closing (source exhausted or `stop()`)
    Closing,
}

impl FlushReason {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Age => "age",
            FlushReason::Forced => "forced",
            FlushReason::Closing => "closing",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, immutable group of items released together
///
/// Items are in arrival order. A batch emitted by a batcher is never empty and
/// never longer than the configured size limit.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    items: Vec<T>,
    reason: FlushReason,
    first_item_at: Instant,
}

impl<T> Batch<T> {
    pub(crate) fn new(items: Vec<T>, reason: FlushReason, first_item_at: Instant) -> Self {
        Self {
            items,
            reason,
            first_item_at,
        }
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for batches emitted by a batcher
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Why this batch was flushed
    pub fn reason(&self) -> FlushReason {
        self.reason
    }

    /// When the first item of this batch was buffered (start of its age clock)
    pub fn first_item_at(&self) -> Instant {
        self.first_item_at
    }

    /// Iterate over the items in arrival order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Take ownership of the items
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Batch<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: PartialEq> PartialEq<Vec<T>> for Batch<T> {
    fn eq(&self, other: &Vec<T>) -> bool {
        &self.items == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_accessors() {
        let now = Instant::now();
        let batch = Batch::new(vec!["a", "b", "c"], FlushReason::Size, now);

        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_eq!(batch.reason(), FlushReason::Size);
        assert_eq!(batch.first_item_at(), now);
        assert_eq!(batch[0], "a");
        assert_eq!(batch, vec!["a", "b", "c"]);
        assert_eq!(batch.into_inner(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_flush_reason_labels() {
        assert_eq!(FlushReason::Size.to_string(), "size");
        assert_eq!(FlushReason::Age.as_str(), "age");
        assert_eq!(FlushReason::Forced.as_str(), "forced");
        assert_eq!(FlushReason::Closing.as_str(), "closing");
    }
}
