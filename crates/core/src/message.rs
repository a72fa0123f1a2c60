// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-owner asynchronous message queue, single-flight on the worker pool.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::log::{deliver, Severity};
use crate::thread_pool::WorkerPool;

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;
type BoxedMessage = Box<dyn Any + Send>;

struct State {
    queue: VecDeque<BoxedMessage>,
    draining: bool,
    closed: bool,
}

struct Inner {
    state: Mutex<State>,
    idle: Condvar,
    handlers: Mutex<HashMap<TypeId, Handler>>,
    pool: Arc<WorkerPool>,
}

/// Dispatches messages of any registered type to their handler, one at a
/// time, on `pool`. `receive` never blocks the sender; handlers run later
/// on a worker thread, in the order their messages were received.
pub struct MessageProcessor {
    inner: Arc<Inner>,
}

impl MessageProcessor {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State { queue: VecDeque::new(), draining: false, closed: false }),
                idle: Condvar::new(),
                handlers: Mutex::new(HashMap::new()),
                pool,
            }),
        }
    }

    /// Register the handler for message type `M`. Overwrites a prior
    /// registration for the same type.
    pub fn on<M, F>(&self, handler: F)
    where
        M: 'static,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let wrapped: Handler = Arc::new(move |message: &dyn Any| {
            if let Some(message) = message.downcast_ref::<M>() {
                handler(message);
            }
        });
        self.inner.handlers.lock().insert(TypeId::of::<M>(), wrapped);
    }

    /// Enqueue `message`. If no drain job is currently running, posts one
    /// to the worker pool. Never blocks.
    pub fn receive<M: Any + Send + 'static>(&self, message: M) {
        let mut needs_drain_job = false;
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                deliver("clypsalot::message", file!(), line!(), Severity::Warn, "message received after processor shutdown, discarding");
                return;
            }
            state.queue.push_back(Box::new(message));
            if !state.draining {
                state.draining = true;
                needs_drain_job = true;
            }
        }

        if needs_drain_job {
            let inner = Arc::clone(&self.inner);
            self.inner.pool.post(move || Self::drain(inner));
        }
    }

    fn drain(inner: Arc<Inner>) {
        loop {
            let message = {
                let mut state = inner.state.lock();
                match state.queue.pop_front() {
                    Some(message) => Some(message),
                    None => {
                        state.draining = false;
                        inner.idle.notify_all();
                        None
                    }
                }
            };

            let Some(message) = message else { break };

            let handler = {
                let handlers = inner.handlers.lock();
                handlers.get(&(*message).type_id()).cloned()
            };

            match handler {
                Some(handler) => handler(&*message),
                None => deliver("clypsalot::message", file!(), line!(), Severity::Warn, "no handler registered for message type"),
            }
        }
    }

    /// Block until any in-flight drain job finishes and no more messages
    /// are queued. Exposed for tests that need a deterministic quiescent
    /// point.
    pub fn drain_sync(&self) {
        let mut state = self.inner.state.lock();
        while state.draining {
            self.inner.idle.wait(&mut state);
        }
    }
}

impl Clone for MessageProcessor {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Drop for MessageProcessor {
    fn drop(&mut self) {
        // `MessageProcessor` is `Clone` so a handle can be captured by each
        // managed object's shutdown subscription; only the last surviving
        // clone should close the shared queue.
        if Arc::strong_count(&self.inner) > 1 {
            return;
        }

        let mut state = self.inner.state.lock();
        state.closed = true;
        while state.draining {
            self.inner.idle.wait(&mut state);
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
