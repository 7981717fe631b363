//! Blocking FIFO handoff between submission and the worker pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::job::JobId;

/// Unbounded queue of job ids. `push` never blocks; `pop` parks the caller
/// until an id is available and hands each id to exactly one caller.
#[derive(Debug, Default)]
pub struct WorkQueue {
    ids: Mutex<VecDeque<JobId>>,
    ready: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobId>> {
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, id: JobId) {
        self.lock().push_back(id);
        self.ready.notify_one();
    }

    pub fn pop(&self) -> JobId {
        let mut ids = self.lock();
        loop {
            if let Some(id) = ids.pop_front() {
                return id;
            }
            ids = self
                .ready
                .wait(ids)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Number of ids waiting for a worker.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
