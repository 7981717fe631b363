//! Job dispatch engine.
//!
//! Ties the store, queue, registry and executor together. Submission is
//! fire-and-forget: the record is stored, its id queued, and the caller gets
//! the queued record back straight away. Agent names are validated later, by
//! the worker that picks the job up.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::SubmitError;
use crate::executor::ProcessExecutor;
use crate::job::{JobId, JobRecord};
use crate::queue::WorkQueue;
use crate::registry::AgentRegistry;
use crate::store::JobStore;
use crate::worker::WorkerPool;

/// Per-job time budget used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Dispatcher {
    store: JobStore,
    queue: WorkQueue,
    registry: AgentRegistry,
    executor: ProcessExecutor,
    timeout: Duration,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(registry: AgentRegistry, executor: ProcessExecutor, timeout: Duration) -> Self {
        Self {
            store: JobStore::new(),
            queue: WorkQueue::new(),
            registry,
            executor,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Accept a job for `agent`. Empty payloads are rejected before an id is issued.
    pub fn submit(&self, agent: &str, payload: Vec<u8>) -> Result<JobRecord, SubmitError> {
        if payload.is_empty() {
            return Err(SubmitError::EmptyPayload);
        }
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = JobRecord::new(id, agent, payload);
        self.store.put(record.clone());
        self.queue.push(id);
        log::info!("job {} queued for agent {}", id, agent);
        Ok(record)
    }

    /// Snapshot of a job; never blocks on execution.
    pub fn job(&self, id: JobId) -> Option<JobRecord> {
        self.store.get(id)
    }

    /// Start the worker pool. Workers live as long as the process.
    pub fn start_workers(self: &Arc<Self>, size: usize) -> io::Result<WorkerPool> {
        WorkerPool::spawn(size, Arc::clone(self))
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &ProcessExecutor {
        &self.executor
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use std::collections::HashSet;
    use std::thread;
    use tempfile::TempDir;

    fn idle_dispatcher(dir: &TempDir) -> Dispatcher {
        Dispatcher::new(
            AgentRegistry::builtin(dir.path()),
            ProcessExecutor::default(),
            DEFAULT_TIMEOUT,
        )
    }

    #[test]
    fn test_submit_stores_and_queues() {
        let dir = TempDir::new().unwrap();
        let d = idle_dispatcher(&dir);

        let job = d.submit("Sun", b"{}".to_vec()).unwrap();
        assert_eq!(job.id, JobId::new(1));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(d.job(job.id).unwrap(), job);
        assert_eq!(d.queue().len(), 1);
    }

    #[test]
    fn test_empty_payload_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let d = idle_dispatcher(&dir);

        assert_eq!(d.submit("Sun", Vec::new()), Err(SubmitError::EmptyPayload));
        assert!(d.store().is_empty());
        assert!(d.queue().is_empty());

        // The rejected submission did not consume an id.
        assert_eq!(d.submit("Sun", b"x".to_vec()).unwrap().id, JobId::new(1));
    }

    #[test]
    fn test_unknown_agent_still_accepted() {
        let dir = TempDir::new().unwrap();
        let d = idle_dispatcher(&dir);

        let job = d.submit("NotAPlanet", b"x".to_vec()).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn test_never_issued_id_is_none() {
        let dir = TempDir::new().unwrap();
        let d = idle_dispatcher(&dir);
        d.submit("Sun", b"x".to_vec()).unwrap();

        assert!(d.job(JobId::new(2)).is_none());
        assert!(d.job(JobId::new(0)).is_none());
    }

    #[test]
    fn test_concurrent_submissions_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let d = Arc::new(idle_dispatcher(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = Arc::clone(&d);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| d.submit("Luna", b"x".to_vec()).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<JobId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(d.store().len(), 200);
        assert_eq!(d.queue().len(), 200);
    }
}
