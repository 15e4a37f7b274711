//! A job-multiplexing worker pool.
//!
//! N OS threads live for the whole session. A job is a stateless
//! closure handed to every worker at once; the closure pulls work
//! items from a bounded input channel the caller filled beforehand and
//! pushes results into a bounded output channel the caller polls with
//! a timeout. Workers never touch the server's primary model.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};

/// How long result polls wait before ticking for progress reporting.
pub const PROGRESS_REFRESH_TIME_MILLIS: u64 = 100;

type Job = Arc<dyn Fn() + Send + Sync + 'static>;

pub struct WorkerPool {
    senders: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut senders = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let (tx, rx) = unbounded::<Job>();
            let handle = std::thread::Builder::new()
                .name(format!("karat-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        // A panicking job must not take the worker down
                        // with it; the caller sees the missing result.
                        let _ = catch_unwind(AssertUnwindSafe(|| job()));
                    }
                })
                .expect("failed to spawn worker thread");
            senders.push(tx);
            handles.push(handle);
        }
        Self { senders, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Hand `job` to every worker. Each worker runs it once; the
    /// closure is expected to drain a shared input queue until empty.
    pub fn multiplex_job(&self, job: impl Fn() + Send + Sync + 'static) {
        let job: Job = Arc::new(job);
        for tx in &self.senders {
            let _ = tx.send(Arc::clone(&job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.senders.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
