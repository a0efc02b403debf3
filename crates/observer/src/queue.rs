//! Unbounded, insertion-ordered buffer shared by producers and the dispatch loop.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-protected pending buffer.
///
/// Producers never block beyond the lock hold time of a `Vec::push`; there is no
/// capacity limit and nothing is ever dropped here. The consumer side takes the
/// whole buffer in one swap, so an `enqueue` racing with `drain_all` lands either
/// in the returned batch or in the next one.
pub struct Queue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Appends an item.
    pub fn enqueue(&self, item: T) {
        self.lock().push(item);
    }

    /// Swaps the buffer for an empty one and returns everything it held, in
    /// insertion order.
    pub fn drain_all(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Snapshot of the number of pending items. Diagnostic only.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock can only happen inside `push`, which
    // leaves the Vec intact, so a poisoned guard is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
