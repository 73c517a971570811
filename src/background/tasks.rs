//! Bounded worker pool for tile fetch and decode
//!
//! A fixed set of named OS threads consumes a FIFO job queue. Dropping the
//! pool closes the queue, lets the workers drain everything already queued,
//! and joins them; jobs submitted before shutdown always run.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize, name: &str) -> Self {
        let (tx, rx) = unbounded::<Job>();
        let workers = (0..threads.max(1))
            .map(|i| {
                let rx: Receiver<Job> = rx.clone();
                thread::Builder::new()
                    .name(format!("{name}-{i}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
        }
    }

    pub fn execute(&self, job: Job) -> crate::Result<()> {
        let tx = self.tx.as_ref().ok_or("worker pool is shut down")?;
        tx.send(job).map_err(|_| "worker pool is shut down".into())
    }

    /// Number of jobs waiting for a free worker
    pub fn queued(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.len())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the sender lets each worker finish the remaining queue
        // before its recv() disconnects.
        self.tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_on_workers() {
        let pool = WorkerPool::new(2, "test-worker");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = counter.clone();
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        // A single slow worker guarantees a backlog at drop time
        let pool = WorkerPool::new(1, "test-worker");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = counter.clone();
            pool.execute(Box::new(move || {
                std::thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_zero_threads_still_gets_one_worker() {
        let pool = WorkerPool::new(0, "test-worker");
        assert_eq!(pool.worker_count(), 1);
    }
}
