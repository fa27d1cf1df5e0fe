//! Snapshots
//!
//! A [`Snapshot`] pins a point-in-time view inside the engine until it is
//! dropped. It is checked against the handle's liveness only when created:
//! dropping it after the database was closed does nothing.

use std::fmt;
use std::sync::Arc;

use crate::guard::GuardedResource;
use crate::native::NativeEngine;

/// Opaque snapshot id handed out by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(pub u64);

/// A consistent read view, released on drop
pub struct Snapshot {
    id: SnapshotId,
    engine: Arc<GuardedResource<Box<dyn NativeEngine>>>,
}

impl Snapshot {
    pub(crate) fn new(id: SnapshotId, engine: Arc<GuardedResource<Box<dyn NativeEngine>>>) -> Self {
        Self { id, engine }
    }

    /// Id to put in [`ReadOptions::snapshot`](crate::ReadOptions)
    pub fn id(&self) -> SnapshotId {
        self.id
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        let id = self.id;
        if self.engine.with_shared(|engine| engine.release_snapshot(id)).is_err() {
            tracing::trace!(snapshot = id.0, "snapshot dropped after close");
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("id", &self.id).finish()
    }
}
