use crate::error::PoolClosed;
use crossfire::mpmc;
use log::*;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of OS threads consuming nullary work units from an
/// unbounded queue.
///
/// Shutdown closes the queue, lets the workers drain whatever is still
/// queued, and joins them; submitting afterwards fails with [PoolClosed].
pub struct WorkerPool {
    tx: Option<crossfire::MTx<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// `size == 0` means hardware parallelism (at least 1).
    pub fn new(size: usize) -> Self {
        let size = if size == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            size
        };
        let (tx, rx) = mpmc::unbounded_blocking::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let worker = thread::Builder::new()
                .name(format!("rpc-worker-{}", i))
                .spawn(move || {
                    // recv drains remaining jobs after the sender is dropped
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .expect("spawn rpc worker");
            workers.push(worker);
        }
        debug!("worker pool started with {} threads", size);
        Self { tx: Some(tx), workers }
    }

    #[inline]
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) -> Result<(), PoolClosed> {
        match self.tx.as_ref() {
            Some(tx) => tx.send(Box::new(job)).map_err(|_| PoolClosed),
            None => Err(PoolClosed),
        }
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Refuse new submissions, drain the queue, join all workers.
    pub fn shutdown(&mut self) {
        if self.tx.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("worker pool drained and joined");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
