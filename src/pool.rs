//! Fixed worker pool with bounded submission.
//!
//! The kernel runs one reducer call per worker thread and never splits a
//! query; fanning a stream of queries out over threads is the host's job.
//! This pool is that host-side piece: a fixed number of workers, a bounded
//! in-flight limit so a request loop blocks instead of queueing without
//! bound, and a barrier to drain outstanding work. Reducer jobs capture an
//! `Arc<Registry>` and call the `&self` query methods, which is exactly the
//! sharing the registry's borrow rules permit.

use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

/// A pool of worker threads executing submitted jobs, at most
/// `workers + queue_depth` in flight at once.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    /// Bounded channel used as a semaphore: a token is a free in-flight
    /// slot. Submitters take one, finished jobs return it.
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    /// Outstanding-job count plus the condvar `wait_idle` blocks on.
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl WorkerPool {
    /// Build a pool of `workers` threads accepting up to `queue_depth`
    /// jobs beyond the ones executing. Returns `None` when either bound
    /// is zero or thread spawning fails.
    pub fn new(workers: usize, queue_depth: usize) -> Option<Self> {
        if workers == 0 || queue_depth == 0 {
            return None;
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .ok()?;

        let capacity = workers + queue_depth;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx.send(()).ok()?;
        }

        Some(WorkerPool {
            pool,
            slot_tx,
            slot_rx,
            state: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    /// Submit a job, blocking while the in-flight limit is reached.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.slot_rx.recv().expect("pool slot channel closed");

        {
            let (pending, _) = &*self.state;
            *pending.lock().unwrap() += 1;
        }

        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            job();
            let (pending, done) = &*state;
            let mut count = pending.lock().unwrap();
            *count -= 1;
            if *count == 0 {
                done.notify_all();
            }
            let _ = slot_tx.send(());
        });
    }

    /// Block until every submitted job has finished. The pool stays
    /// usable afterwards.
    pub fn wait_idle(&self) {
        let (pending, done) = &*self.state;
        let mut count = pending.lock().unwrap();
        while *count > 0 {
            count = done.wait(count).unwrap();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Draining first keeps jobs from outliving borrowed state; the
        // rayon pool joins its threads on drop.
        self.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_job() {
        let pool = WorkerPool::new(4, 8).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_idle();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        assert!(WorkerPool::new(0, 4).is_none());
        assert!(WorkerPool::new(4, 0).is_none());
    }

    #[test]
    fn wait_idle_then_reuse() {
        let pool = WorkerPool::new(2, 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for round in 0..3 {
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
            pool.wait_idle();
            assert_eq!(counter.load(Ordering::Relaxed), (round + 1) * 10);
        }
    }
}
