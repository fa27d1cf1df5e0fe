//! Background Worker
//!
//! One thread per writable engine that runs flushes and automatic
//! compactions handed to it over a channel.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{StoreError, StoreResult};
use crate::native::ColumnFamilyId;

use super::core::EngineCore;

/// Work items for the background thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Job {
    Flush,
    Compact(ColumnFamilyId),
    Stop,
}

pub(crate) struct BackgroundWorker {
    jobs: Sender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Start the worker. It only holds a weak reference so it never keeps
    /// the engine alive on its own.
    pub(crate) fn spawn(core: &Arc<EngineCore>) -> StoreResult<Self> {
        let (tx, rx) = channel::unbounded();
        let weak = Arc::downgrade(core);
        let handle = thread::Builder::new()
            .name("atlas-bg".to_string())
            .spawn(move || run(weak, rx))
            .map_err(StoreError::Io)?;
        Ok(Self {
            jobs: tx,
            handle: Some(handle),
        })
    }

    /// Sender the engine uses to queue jobs
    pub(crate) fn sender(&self) -> Sender<Job> {
        self.jobs.clone()
    }

    /// Ask the worker to exit after its current job and wait for it
    pub(crate) fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The worker may already be gone if the engine dropped
        let _ = self.jobs.send(Job::Stop);
        if handle.join().is_err() {
            tracing::error!("background worker panicked");
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(core: Weak<EngineCore>, jobs: Receiver<Job>) {
    tracing::debug!("background worker started");
    for job in jobs.iter() {
        let Some(core) = core.upgrade() else {
            break;
        };
        let result = match job {
            Job::Stop => break,
            Job::Flush => core.background_flush(),
            Job::Compact(cf) => core.background_compact(cf),
        };
        match result {
            Ok(()) => {}
            Err(StoreError::ShutdownInProgress(_)) => {
                tracing::debug!(?job, "background job skipped during shutdown")
            }
            Err(e) => tracing::warn!(?job, error = %e, "background job failed"),
        }
    }
    tracing::debug!("background worker stopped");
}
