//! In-memory job store.
//!
//! One coarse lock guards the whole map. Readers get clones, never handles.
//! Records are retained for the life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::job::{JobId, JobRecord};

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking holder cannot leave a half-written record behind (all writes
    // are single inserts), so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobRecord>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a new record under its own id and return that id.
    pub fn put(&self, record: JobRecord) -> JobId {
        let id = record.id;
        self.lock().insert(id, record);
        id
    }

    /// Snapshot of the record, or `None` for an id that was never stored.
    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.lock().get(&id).cloned()
    }

    /// Replace the stored record keyed by `record.id`.
    pub fn update(&self, record: JobRecord) {
        let mut jobs = self.lock();
        if let Some(prev) = jobs.get(&record.id) {
            if prev.status != record.status && !prev.status.can_advance_to(record.status) {
                log::warn!(
                    "job {} status moving backwards: {} -> {}",
                    record.id,
                    prev.status,
                    record.status
                );
            }
        }
        jobs.insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
