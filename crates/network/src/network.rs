// SPDX-License-Identifier: LGPL-3.0-or-later

//! The network supervisor.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use clypsalot_core::catalog::object_catalog;
use clypsalot_core::message::MessageProcessor;
use clypsalot_core::{Error, Object, ObjectHandle, ObjectId, ObjectState, Port, ReentrantLock, Subscription, WorkerPool};

/// Posted onto the supervisor's [`MessageProcessor`] whenever one of its
/// managed nodes reaches `ObjectShutdownEvent`. Tagged with the
/// supervisor's `generation` at the moment the underlying event fired, so
/// a notification left over from a previous `start()`/`stop()` cycle is
/// recognized and dropped instead of corrupting a later run's quiescence
/// walk — the same stale-job hazard exists across any stop-then-restart
/// of the worker pool.
struct ShutdownNotification {
    object: ObjectId,
    generation: u64,
}

struct ManagedEntry {
    object: ObjectHandle,
    // Kept alive only to hold the subscription; never read directly.
    _subscription: Subscription,
}

struct Inner {
    managed: Vec<ManagedEntry>,
    wait_for_shutdown: HashMap<ObjectId, bool>,
    running: bool,
    generation: u64,
}

/// Owns a set of managed objects, starts/stops them together, and stops
/// the whole network once the downstream subgraph of any node that shuts
/// down has itself fully drained.
///
/// Always held behind an `Arc` (see [`Network::new`]): each managed
/// object's shutdown subscription closes over a `Weak<Network>` so it can
/// reach back into [`Network::handle_shutdown`] without keeping the
/// network alive on its own.
pub struct Network {
    lock: ReentrantLock<Inner>,
    messages: parking_lot::Mutex<Option<MessageProcessor>>,
    pool: Arc<WorkerPool>,
    self_weak: Weak<Network>,
}

impl Network {
    pub fn new(pool: Arc<WorkerPool>) -> Arc<Self> {
        Arc::new_cyclic(|self_weak: &Weak<Network>| {
            let mut messages = MessageProcessor::new(Arc::clone(&pool));
            let handler_weak = self_weak.clone();
            messages.on::<ShutdownNotification, _>(move |notification: &ShutdownNotification| {
                if let Some(network) = handler_weak.upgrade() {
                    network.handle_shutdown(notification);
                }
            });

            Network {
                lock: ReentrantLock::new(Inner {
                    managed: Vec::new(),
                    wait_for_shutdown: HashMap::new(),
                    running: false,
                    generation: 0,
                }),
                messages: parking_lot::Mutex::new(Some(messages)),
                pool,
                self_weak: self_weak.clone(),
            }
        })
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        let guard = self.lock.lock();
        guard.borrow().managed.iter().any(|entry| entry.object.id() == id)
    }

    pub fn is_running(&self) -> bool {
        let guard = self.lock.lock();
        guard.borrow().running
    }

    /// Build a new object of `kind` from the process-wide object catalog
    /// and register it with this network.
    ///
    /// Returns the teardown-aware [`ObjectHandle`], not a bare `Arc<Object>`:
    /// a raw `Arc` has no destruction glue, so if it ever became the last
    /// external holder of a still-linked object, the object would drop
    /// without unlinking first.
    pub fn make_object(&self, kind: &str) -> Result<ObjectHandle, Error> {
        let handle = object_catalog().make(kind, Arc::clone(&self.pool))?;
        let returned = handle.clone();
        self.add_object(handle)?;
        Ok(returned)
    }

    /// Register an already-constructed object with this network.
    #[allow(clippy::expect_used)]
    pub fn add_object(&self, object: ObjectHandle) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();

        if inner.managed.iter().any(|entry| entry.object.id() == object.id()) {
            return Err(Error::Runtime(format!("object {} is already registered with this network", object.id())));
        }

        let self_weak = self.self_weak.clone();
        // the queue is only ever cleared by Drop, which can't run concurrently with this call
        let messages = self.messages.lock().as_ref().expect("messages only cleared by Drop").clone();
        let subscription = object.subscribe_shutdown(move |event| {
            if let Some(network) = self_weak.upgrade() {
                let generation = network.lock.lock().borrow().generation;
                messages.receive(ShutdownNotification { object: event.object, generation });
            }
            Ok(())
        })?;

        inner.managed.push(ManagedEntry { object, _subscription: subscription });
        Ok(())
    }

    /// Start every managed node (paused → waiting) and mark the network as
    /// running.
    pub fn start(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.start_locked(&mut inner)
    }

    fn start_locked(&self, inner: &mut Inner) -> Result<(), Error> {
        if inner.running {
            return Ok(());
        }

        inner.generation += 1;
        inner.wait_for_shutdown.clear();
        for entry in &inner.managed {
            entry.object.start()?;
        }

        inner.running = true;
        self.lock.notify_all();
        Ok(())
    }

    /// `start()` then block until the network is no longer running.
    pub fn run(&self) -> Result<(), Error> {
        let mut guard = self.lock.lock();
        {
            let mut inner = guard.borrow_mut();
            self.start_locked(&mut inner)?;
        }

        loop {
            let running = guard.borrow().running;
            if !running {
                return Ok(());
            }
            guard = self.lock.wait(guard);
        }
    }

    /// Stop every non-terminal managed node and clear `running`.
    pub fn stop(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.stop_locked(&mut inner);
        Ok(())
    }

    fn stop_locked(&self, inner: &mut Inner) {
        if !inner.running {
            return;
        }

        for entry in &inner.managed {
            stop_best_effort(&entry.object);
        }

        inner.running = false;
        self.lock.notify_all();
    }

    fn handle_shutdown(&self, notification: &ShutdownNotification) {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();

        if !inner.running || notification.generation != inner.generation {
            return;
        }

        let Some(start_entry) = inner.managed.iter().find(|entry| entry.object.id() == notification.object) else {
            return;
        };
        let start_id = start_entry.object.id();
        let start_terminal = start_entry.object.state().is_terminal();
        let start_outputs = start_entry.object.outputs();

        let mut seen = HashSet::new();
        seen.insert(start_id);
        inner.wait_for_shutdown.insert(start_id, !start_terminal);

        let mut stack: Vec<Arc<Object>> = Vec::new();
        for output in start_outputs {
            for link in output.links() {
                if let Some(input) = link.to() {
                    if let Some(next) = input.parent() {
                        if seen.insert(next.id()) {
                            stack.push(next);
                        }
                    }
                }
            }
        }

        while let Some(object) = stack.pop() {
            let terminal = object.state().is_terminal();
            inner.wait_for_shutdown.insert(object.id(), !terminal);

            for output in object.outputs() {
                for link in output.links() {
                    if let Some(input) = link.to() {
                        if let Some(next) = input.parent() {
                            if seen.insert(next.id()) {
                                stack.push(next);
                            }
                        }
                    }
                }
            }
        }

        if should_stop(&inner.wait_for_shutdown) {
            self.stop_locked(&mut inner);
        }
    }
}

fn should_stop(wait_for_shutdown: &HashMap<ObjectId, bool>) -> bool {
    !wait_for_shutdown.is_empty() && wait_for_shutdown.values().all(|waiting| !waiting)
}

fn stop_best_effort(object: &Object) {
    let state = object.state();
    if state.is_terminal() {
        return;
    }
    if matches!(state, ObjectState::Scheduled | ObjectState::Executing) {
        let _ = object.pause();
    }
    let _ = object.stop();
}

impl Drop for Network {
    fn drop(&mut self) {
        // Drop the message processor first so no late-arriving shutdown
        // notification can re-enter a half-destroyed supervisor.
        self.messages.lock().take();

        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.stop_locked(&mut inner);
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
