// SPDX-License-Identifier: LGPL-3.0-or-later

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn post_runs_the_job() {
    let pool = WorkerPool::new(2);
    let (tx, rx) = mpsc::channel();
    pool.post(move || tx.send(42).unwrap());
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
}

#[test]
fn call_returns_the_jobs_value() {
    let pool = WorkerPool::new(2);
    let value = pool.call(|| 1 + 1);
    assert_eq!(value, 2);
}

#[test]
fn call_propagates_a_panic_to_the_caller() {
    let pool = WorkerPool::new(1);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pool.call(|| -> i32 { panic!("boom") })
    }));
    assert!(result.is_err());
}

#[test]
fn call_is_reentrant_from_a_worker_thread() {
    let pool = Arc::new(WorkerPool::new(1));
    let inner = Arc::clone(&pool);
    let value = pool.call(move || inner.call(|| 7));
    assert_eq!(value, 7);
}

#[test]
fn jobs_run_in_fifo_order() {
    let pool = WorkerPool::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let order = Arc::clone(&order);
        let counter = Arc::clone(&counter);
        pool.post(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            order.lock().push(n);
        });
    }

    pool.shutdown();
    let seen = order.lock().clone();
    let expected: Vec<usize> = (0..20).collect();
    assert_eq!(seen, expected);
}

#[test]
fn post_discards_a_panicking_job_without_poisoning_the_pool() {
    let pool = WorkerPool::new(1);
    pool.post(|| panic!("posted job panics"));
    let value = pool.call(|| 99);
    assert_eq!(value, 99);
}

#[test]
fn set_threads_changes_worker_count() {
    let pool = WorkerPool::new(1);
    assert_eq!(pool.threads(), 1);
    pool.set_threads(3);
    assert_eq!(pool.threads(), 3);
    let value = pool.call(|| "still alive");
    assert_eq!(value, "still alive");
}
