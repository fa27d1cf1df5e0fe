//! Guarded Resource
//!
//! Couples a long-lived native handle with its liveness flag so that the
//! "is it still open?" check and the use of the handle happen under one lock.
//!
//! ## Locking Discipline
//! - Data operations take the **shared** lock, check the flag, then use the
//!   resource. Any number of them run at once.
//! - Close takes the **exclusive** lock, clears the flag and takes the
//!   resource out. It waits for every in-flight shared holder to leave.
//!
//! The resource is only reachable through [`GuardedResource::with_shared`] and
//! [`GuardedResource::with_exclusive`], so a call site cannot skip the check.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// A resource that may be irreversibly closed while other threads use it
pub struct GuardedResource<T> {
    /// Single source of truth for liveness. Only written under the
    /// exclusive lock; read lock-free by [`is_open`](Self::is_open).
    open: AtomicBool,

    /// The resource itself. `None` once released.
    slot: RwLock<Option<T>>,
}

impl<T> GuardedResource<T> {
    /// Wrap an open resource
    pub fn new(resource: T) -> Self {
        Self {
            open: AtomicBool::new(true),
            slot: RwLock::new(Some(resource)),
        }
    }

    /// Lock-free liveness probe. Only advisory: the answer may be stale by
    /// the time the caller acts on it.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Run `op` with shared access to the resource.
    ///
    /// Returns [`Error::Closed`] without calling `op` when the resource has
    /// been closed. The lock is released on every exit path, including a
    /// panic inside `op`.
    pub fn with_shared<R>(&self, op: impl FnOnce(&T) -> R) -> Result<R> {
        let slot = self.slot.read();
        if !self.open.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        match slot.as_ref() {
            Some(resource) => Ok(op(resource)),
            None => Err(Error::Closed),
        }
    }

    /// Run `op` with exclusive access. No shared holder is active while `op`
    /// runs, and none can start until it returns.
    pub fn with_exclusive<R>(&self, op: impl FnOnce(ExclusiveAccess<'_, T>) -> R) -> R {
        let mut slot = self.slot.write();
        op(ExclusiveAccess {
            open: &self.open,
            slot: &mut slot,
        })
    }
}

/// Exclusive view handed to [`GuardedResource::with_exclusive`]
pub struct ExclusiveAccess<'a, T> {
    open: &'a AtomicBool,
    slot: &'a mut Option<T>,
}

impl<'a, T> ExclusiveAccess<'a, T> {
    /// Whether the resource is still open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Mutable access to a still-open resource
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.is_open() {
            self.slot.as_mut()
        } else {
            None
        }
    }

    /// Mark the resource closed and hand it out for release.
    ///
    /// Returns `None` if it was already released; calling this twice is
    /// harmless.
    pub fn release(self) -> Option<T> {
        self.open.store(false, Ordering::Release);
        self.slot.take()
    }
}
