//! Fixed-capacity holding area for items that have not been flushed yet.

use std::sync::{Arc, Mutex, MutexGuard};

/// Ordered buffer of at most `capacity` items
///
/// Only the owner mutates it. Any number of [`AccumulatorView`]s can query the
/// length concurrently; reads and writes go through the same lock so a view
/// never observes a length that disagrees with the buffered contents.
#[derive(Debug)]
pub struct Accumulator<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    items: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> Shared<T> {
    // A panic while holding the lock cannot leave the Vec half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<T> Accumulator<T> {
    /// Create an empty accumulator holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(Vec::with_capacity(capacity)),
                capacity,
            }),
        }
    }

    /// Append an item and return the new length
    ///
    /// The accumulator must not be full.
    pub fn append(&mut self, item: T) -> usize {
        let mut items = self.shared.lock();
        debug_assert!(items.len() < self.shared.capacity, "append on a full accumulator");
        items.push(item);
        items.len()
    }

    /// Take the buffered items and reset to a fresh empty buffer
    ///
    /// The returned Vec does not share storage with the new buffer.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = self.shared.lock();
        std::mem::replace(&mut *items, Vec::with_capacity(self.shared.capacity))
    }

    /// Current number of buffered items
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer reached its capacity
    pub fn is_full(&self) -> bool {
        self.len() >= self.shared.capacity
    }

    /// Maximum number of buffered items
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T: Send + 'static> Accumulator<T> {
    /// Read-only handle for querying the length from other tasks or threads
    pub fn view(&self) -> AccumulatorView {
        AccumulatorView {
            inner: self.shared.clone(),
        }
    }
}

/// Read-only, cloneable view of an [`Accumulator`]'s fill level
#[derive(Clone)]
pub struct AccumulatorView {
    inner: Arc<dyn FillLevel>,
}

trait FillLevel: Send + Sync {
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
}

impl<T: Send> FillLevel for Shared<T> {
    fn len(&self) -> usize {
        Shared::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl AccumulatorView {
    /// Current number of buffered items
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer reached its capacity
    pub fn is_full(&self) -> bool {
        self.len() >= self.inner.capacity()
    }
}

impl std::fmt::Debug for AccumulatorView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulatorView")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity())
            .finish()
    }
}
