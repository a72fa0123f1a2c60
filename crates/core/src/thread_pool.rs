// SPDX-License-Identifier: LGPL-3.0-or-later

//! The shared worker pool.

use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::log::{deliver, Severity};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    closed: AtomicBool,
    pool_id: u64,
}

thread_local! {
    /// Which pool (if any) the current thread is a worker of, used to make
    /// `call` re-entrant: a worker calling back into its own pool runs the
    /// job inline instead of posting and deadlocking waiting on itself.
    static CURRENT_POOL: Cell<Option<u64>> = const { Cell::new(None) };
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// A fixed-size FIFO job queue with `N` worker threads.
///
/// `post` never blocks the caller. `call` posts a job and blocks until it
/// completes, re-raising a panic from the job synchronously to the caller —
/// except when called from one of this pool's own worker threads, in which
/// case the job simply runs inline on the calling thread (the re-entrancy
/// contract: a worker calling `call` on its own pool must never deadlock).
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    id: u64,
}

impl WorkerPool {
    /// `threads == 0` picks a sensible default (the number of available
    /// parallelism units, at least 1).
    pub fn new(threads: usize) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed) as u64;
        let shared =
            Arc::new(Shared { jobs: Mutex::new(VecDeque::new()), condvar: Condvar::new(), closed: AtomicBool::new(false), pool_id: id });

        let pool = Self { shared: Arc::clone(&shared), workers: Mutex::new(Vec::new()), id };
        pool.spawn_workers(Self::effective_count(threads));
        pool
    }

    fn effective_count(threads: usize) -> usize {
        if threads > 0 {
            return threads;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    fn spawn_workers(&self, count: usize) {
        let mut workers = self.workers.lock();
        for _ in 0..count {
            let shared = Arc::clone(&self.shared);
            workers.push(std::thread::spawn(move || Self::worker_loop(shared)));
        }
    }

    fn worker_loop(shared: Arc<Shared>) {
        CURRENT_POOL.with(|cell| cell.set(Some(shared.pool_id)));

        loop {
            let job = {
                let mut jobs = shared.jobs.lock();
                loop {
                    if let Some(job) = jobs.pop_front() {
                        break Some(job);
                    }
                    if shared.closed.load(Ordering::Acquire) {
                        break None;
                    }
                    shared.condvar.wait(&mut jobs);
                }
            };

            let Some(job) = job else { break };

            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                deliver("clypsalot::thread_pool", file!(), line!(), Severity::Error, "worker job panicked");
            }
        }
    }

    /// Reconfigure the pool at runtime by joining the current workers and
    /// respawning with the new count.
    pub fn set_threads(&self, threads: usize) {
        {
            let mut workers = self.workers.lock();
            self.shared.closed.store(true, Ordering::Release);
            self.shared.condvar.notify_all();
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
            self.shared.closed.store(false, Ordering::Release);
        }
        self.spawn_workers(Self::effective_count(threads));
    }

    pub fn threads(&self) -> usize {
        self.workers.lock().len()
    }

    /// Enqueue `job`; never blocks the caller. A panicking job is caught
    /// and logged, not propagated — `post` discards the failure.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.jobs.lock().push_back(Box::new(job));
        self.shared.condvar.notify_one();
    }

    /// Post `job` and block until it returns, propagating a panic back to
    /// the caller. Re-entrant: calling `call` from inside one of this
    /// pool's own worker threads runs `job` inline.
    pub fn call<T, F>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let is_worker = CURRENT_POOL.with(|cell| cell.get() == Some(self.id));
        if is_worker {
            return job();
        }

        let (tx, rx) = mpsc::channel();
        self.post(move || {
            let result = catch_unwind(AssertUnwindSafe(job));
            let _ = tx.send(result);
        });

        match rx.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => std::panic::resume_unwind(payload),
            Err(_) => {
                deliver(
                    "clypsalot::thread_pool",
                    file!(),
                    line!(),
                    Severity::Error,
                    "call()'s job never completed — pool shut down while the call was in flight",
                );
                std::panic::resume_unwind(Box::new("clypsalot: worker pool shut down during call()"));
            }
        }
    }

    /// Stop accepting new work, drain what is queued, and join every
    /// worker thread.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock();
        self.shared.closed.store(true, Ordering::Release);
        self.shared.condvar.notify_all();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "thread_pool_tests.rs"]
mod tests;
