//! Collections shared by the registry structures
//!
//! Every registry structure of the framework (service records, observer
//! records, subscribers, device lists) is an ordered list guarded by its own
//! lock. [`LockedList`] is that primitive: an owned `Vec` behind a
//! [`spin::Mutex`], with search and removal by predicate so callers never see
//! the lock guard. Closures passed to it run with the lock held and must not
//! call back into the same list.

use alloc::vec::Vec;
use spin::Mutex;

/// Ordered, lock-protected list
pub struct LockedList<T> {
    items: Mutex<Vec<T>>,
}

impl<T> LockedList<T> {
    /// Create an empty list
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append an item at the tail
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Append `item` unless an existing entry satisfies `exists`.
    ///
    /// The check and the insertion happen under one lock acquisition. On
    /// conflict the item is handed back to the caller.
    pub fn push_unless<F>(&self, item: T, exists: F) -> core::result::Result<(), T>
    where
        F: Fn(&T) -> bool,
    {
        let mut items = self.items.lock();
        if items.iter().any(|entry| exists(entry)) {
            return Err(item);
        }
        items.push(item);
        Ok(())
    }

    /// Return the first value produced by `f`, scanning in list order
    pub fn find_map<R, F>(&self, f: F) -> Option<R>
    where
        F: FnMut(&T) -> Option<R>,
    {
        self.items.lock().iter().find_map(f)
    }

    /// Whether any entry satisfies `pred`
    pub fn contains<F>(&self, pred: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        self.items.lock().iter().any(pred)
    }

    /// Detach and return the first entry satisfying `pred`
    pub fn remove_first<F>(&self, pred: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut items = self.items.lock();
        let index = items.iter().position(pred)?;
        Some(items.remove(index))
    }

    /// Detach and return every entry satisfying `pred`, keeping the order
    pub fn remove_all<F>(&self, pred: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut items = self.items.lock();
        let mut removed = Vec::new();
        let mut index = 0;
        while index < items.len() {
            if pred(&items[index]) {
                removed.push(items.remove(index));
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Run `f` on the whole list with the lock held
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<T>) -> R,
    {
        f(&mut self.items.lock())
    }

    /// Detach every entry, leaving the list empty
    pub fn flush(&self) -> Vec<T> {
        core::mem::take(&mut *self.items.lock())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T: Clone> LockedList<T> {
    /// Clone the current contents
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T> Default for LockedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for LockedList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.items.lock().iter()).finish()
    }
}
