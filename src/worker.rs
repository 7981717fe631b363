//! Fixed-size pool of worker threads.
//!
//! Each worker loops forever: pop an id, resolve the agent, run it, write the
//! terminal record back. Per-job failures end up in the job record and the
//! worker goes straight back to the queue.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::dispatch::Dispatcher;
use crate::executor::Execution;
use crate::job::{JobId, JobStatus};

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: usize = 2;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` daemon workers draining the dispatcher's queue.
    pub fn spawn(size: usize, dispatcher: Arc<Dispatcher>) -> io::Result<Self> {
        let handles = (0..size.max(1))
            .map(|n| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::Builder::new()
                    .name(format!("worker-{}", n))
                    .spawn(move || worker_loop(n, &dispatcher))
            })
            .collect::<io::Result<Vec<_>>>()?;
        log::info!("started {} workers", handles.len());
        Ok(Self { handles })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }
}

fn worker_loop(n: usize, dispatcher: &Dispatcher) {
    loop {
        let id = dispatcher.queue().pop();
        log::debug!("worker-{} picked up job {}", n, id);
        process_job(dispatcher, id);
    }
}

/// Take one job from `queued` to a terminal state. Returns the terminal
/// status, or `None` if the id is not in the store.
pub fn process_job(dispatcher: &Dispatcher, id: JobId) -> Option<JobStatus> {
    let store = dispatcher.store();
    let Some(job) = store.get(id) else {
        log::warn!("job {} was queued but is not in the store; skipping", id);
        return None;
    };

    let script = match dispatcher.registry().resolve(&job.agent) {
        Ok(script) => script,
        Err(e) => {
            log::warn!("job {}: {}", id, e);
            let failed = job.failed(e.to_string());
            store.update(failed);
            return Some(JobStatus::Error);
        }
    };

    let running = job.started();
    store.update(running.clone());
    log::info!("job {} running agent {}", id, running.agent);

    let timeout = dispatcher.timeout();
    let finished = match dispatcher
        .executor()
        .execute(id, &script, &running.payload, timeout)
    {
        Ok(Execution::Exited { output, exit_code }) => {
            let status = if exit_code == 0 {
                JobStatus::Done
            } else {
                JobStatus::Error
            };
            running.finished(status, exit_code, output, String::new())
        }
        Ok(Execution::TimedOut) => {
            log::warn!("job {} timed out after {:?}", id, timeout);
            running.timed_out(timeout)
        }
        Err(e) => {
            log::warn!("job {}: {}", id, e);
            running.failed(e.to_string())
        }
    };

    let status = finished.status;
    store.update(finished);
    log::info!("job {} finished: {}", id, status);
    Some(status)
}
