// SPDX-License-Identifier: LGPL-3.0-or-later

//! The node: lifecycle state machine, properties, ports, `process()`.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use smol_str::SmolStr;

use crate::error::Error;
use crate::event::{EventBus, Subscription};
use crate::id::ObjectId;
use crate::log::{deliver, Severity};
use crate::port::{InputPort, OutputPort, Port, PortType};
use crate::property::{AnyValue, ObjectConfig, Property};
use crate::sync::ReentrantLock;
use crate::thread_pool::WorkerPool;

/// States of the object lifecycle state machine. `pause`/`resume` let a
/// running node be parked and restarted without losing its properties or
/// ports; both the internal link/unlink transaction and the public API
/// need `paused` reachable from `waiting`/`scheduled`/`executing` and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    Initializing,
    Configuring,
    Paused,
    Waiting,
    Scheduled,
    Executing,
    Stopped,
    Faulted,
}

crate::simple_display! {
    ObjectState {
        Initializing => "initializing",
        Configuring => "configuring",
        Paused => "paused",
        Waiting => "waiting",
        Scheduled => "scheduled",
        Executing => "executing",
        Stopped => "stopped",
        Faulted => "faulted",
    }
}

impl ObjectState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Faulted)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Waiting | Self::Scheduled | Self::Executing)
    }
}

/// The outcome of one `process()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Blocked,
    Finished,
    EndOfData,
}

/// Lifecycle hooks a node kind overrides; all default to no-ops that
/// immediately finish.
pub trait ObjectHooks: Send + Sync {
    fn handle_init(&self, _object: &Object) -> Result<(), Error> {
        Ok(())
    }

    fn handle_configure(&self, _object: &Object, _config: &ObjectConfig) -> Result<(), Error> {
        Ok(())
    }

    fn handle_end_of_data(&self, _object: &Object) -> Result<(), Error> {
        Ok(())
    }

    fn process(&self, _object: &Object) -> Result<ProcessResult, Error> {
        Ok(ProcessResult::Finished)
    }
}

/// The default no-op hook set, useful for tests and for nodes with no
/// behavior beyond plumbing.
pub struct NoopHooks;
impl ObjectHooks for NoopHooks {}

/// Emitted on every state transition.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStateChangedEvent {
    pub object: ObjectId,
    pub from: ObjectState,
    pub to: ObjectState,
}

/// Emitted once, when the object reaches `stopped`.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStoppedEvent {
    pub object: ObjectId,
}

/// Emitted once, whenever the object reaches a terminal state (`stopped`
/// or `faulted`), always last.
#[derive(Debug, Clone, Copy)]
pub struct ObjectShutdownEvent {
    pub object: ObjectId,
}

/// Emitted when a lifecycle hook fails, immediately before the
/// transition to `faulted`.
#[derive(Debug, Clone)]
pub struct ObjectFaultedEvent {
    pub object: ObjectId,
    pub message: String,
}

struct Inner {
    state: ObjectState,
    outputs: Vec<Arc<OutputPort>>,
    inputs: Vec<Arc<InputPort>>,
    properties: HashMap<SmolStr, Property>,
    /// Set once a schedule job has been posted for the current `waiting`
    /// period, cleared on entry to `waiting`. Prevents re-scheduling a
    /// node that is already `scheduled`/`executing`.
    schedule_pending: bool,
}

/// A processing node.
pub struct Object {
    id: ObjectId,
    kind: SmolStr,
    self_weak: Weak<Object>,
    lock: ReentrantLock<Inner>,
    events: EventBus,
    hooks: Box<dyn ObjectHooks>,
    pool: Arc<WorkerPool>,
    being_destroyed: AtomicBool,
}

impl Object {
    // a freshly constructed EventBus has no registrations yet, so these can never collide
    #[allow(clippy::expect_used)]
    pub fn new(kind: impl Into<SmolStr>, hooks: Box<dyn ObjectHooks>, pool: Arc<WorkerPool>) -> ObjectHandle {
        let events = EventBus::new();
        events.register::<ObjectStateChangedEvent>().expect("fresh EventBus registration cannot collide");
        events.register::<ObjectStoppedEvent>().expect("fresh EventBus registration cannot collide");
        events.register::<ObjectShutdownEvent>().expect("fresh EventBus registration cannot collide");
        events.register::<ObjectFaultedEvent>().expect("fresh EventBus registration cannot collide");

        let arc = Arc::new_cyclic(|self_weak| Object {
            id: ObjectId::next(),
            kind: kind.into(),
            self_weak: self_weak.clone(),
            lock: ReentrantLock::new(Inner {
                state: ObjectState::Initializing,
                outputs: Vec::new(),
                inputs: Vec::new(),
                properties: HashMap::new(),
                schedule_pending: false,
            }),
            events,
            hooks,
            pool,
            being_destroyed: AtomicBool::new(false),
        });
        ObjectHandle(arc)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> ObjectState {
        self.lock.lock().borrow().state
    }

    /// A transient strong reference obtained from this object's own weak
    /// self-pointer. Used internally so hook calls and worker-pool jobs
    /// have an owning `Arc<Object>` to operate on; unrelated to
    /// [`ObjectHandle`]'s teardown bookkeeping.
    fn handle(&self) -> Option<Arc<Object>> {
        self.self_weak.upgrade()
    }

    // ---- properties -----------------------------------------------------

    /// Declare a property; callers add these during `configuring`/`paused`
    /// the same way ports are added, by convention during the same window.
    pub fn add_property(&self, property: Property) {
        let guard = self.lock.lock();
        guard.borrow_mut().properties.insert(SmolStr::new(property.name()), property);
    }

    pub fn property(&self, name: &str) -> Result<Property, Error> {
        let guard = self.lock.lock();
        guard.borrow().properties.get(name).cloned().ok_or_else(|| Error::key_not_found(name))
    }

    pub fn properties(&self) -> Vec<Property> {
        self.lock.lock().borrow().properties.values().cloned().collect()
    }

    /// Public write path: checked against `public_mutable`.
    pub fn set_property(&self, name: &str, value: AnyValue) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        let property = inner.properties.get_mut(name).ok_or_else(|| Error::key_not_found(name))?;
        property.set_public(value)
    }

    // ---- ports ------------------------------------------------------------

    /// Ports are only created while `configuring` or `paused`.
    pub fn add_output(&self, name: impl Into<SmolStr>, port_type: Arc<PortType>) -> Result<Arc<OutputPort>, Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.require_state(inner.state, &[ObjectState::Configuring, ObjectState::Paused])?;
        let port = Arc::new(OutputPort::new(name, port_type, self.self_weak.clone()));
        inner.outputs.push(Arc::clone(&port));
        Ok(port)
    }

    pub fn add_input(&self, name: impl Into<SmolStr>, port_type: Arc<PortType>, required: bool) -> Result<Arc<InputPort>, Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.require_state(inner.state, &[ObjectState::Configuring, ObjectState::Paused])?;
        let port = Arc::new(InputPort::with_required(name, port_type, self.self_weak.clone(), required));
        inner.inputs.push(Arc::clone(&port));
        Ok(port)
    }

    pub fn outputs(&self) -> Vec<Arc<OutputPort>> {
        self.lock.lock().borrow().outputs.clone()
    }

    pub fn inputs(&self) -> Vec<Arc<InputPort>> {
        self.lock.lock().borrow().inputs.clone()
    }

    // ---- state machine ------------------------------------------------------

    fn require_state(&self, actual: ObjectState, expected: &[ObjectState]) -> Result<(), Error> {
        if expected.contains(&actual) {
            Ok(())
        } else {
            Err(Error::state(self.id, actual, expected.to_vec()))
        }
    }

    fn transition(&self, inner: &mut Inner, to: ObjectState) {
        let from = inner.state;
        inner.state = to;
        let _ = self.events.send(&ObjectStateChangedEvent { object: self.id, from, to });

        if to.is_terminal() {
            if to == ObjectState::Stopped {
                let _ = self.events.send(&ObjectStoppedEvent { object: self.id });
            }
            let _ = self.events.send(&ObjectShutdownEvent { object: self.id });
        }
    }

    /// Run `hook`, catching a panic as a fatal, unrecoverable error: an
    /// unknown/foreign failure inside a lifecycle hook is not something the
    /// error taxonomy can represent, so it aborts the process with a
    /// diagnostic instead.
    fn call_hook<T>(&self, name: &str, hook: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
        match catch_unwind(AssertUnwindSafe(hook)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&payload);
                deliver(
                    "clypsalot::object",
                    file!(),
                    line!(),
                    Severity::Fatal,
                    &format!("object {} hook {name:?} panicked: {message}", self.id),
                );
                std::process::abort();
            }
        }
    }

    /// Drive the object to `faulted`, emitting `ObjectFaultedEvent` then
    /// `ObjectShutdownEvent`.
    fn fault(&self, inner: &mut Inner, message: String) {
        let _ = self.events.send(&ObjectFaultedEvent { object: self.id, message });
        self.transition(inner, ObjectState::Faulted);
    }

    pub fn init(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        {
            let inner = guard.borrow();
            self.require_state(inner.state, &[ObjectState::Initializing])?;
        }

        // The RefCell borrow above is dropped before running the hook: a
        // hook is allowed to call back into the object's public API
        // (re-entering this same recursive lock), and that re-entry would
        // panic on a `RefCell` double-borrow if we still held one here.
        let Some(handle) = self.handle() else { return Err(Error::Runtime("object has no live handle during init".into())) };
        let result = self.call_hook("handle_init", || self.hooks.handle_init(&handle));

        let mut inner = guard.borrow_mut();
        match result {
            Ok(()) => {
                self.transition(&mut inner, ObjectState::Configuring);
                Ok(())
            }
            Err(error) => {
                self.fault(&mut inner, error.to_string());
                Err(error)
            }
        }
    }

    pub fn configure(&self, config: &ObjectConfig) -> Result<(), Error> {
        let guard = self.lock.lock();
        {
            let mut inner = guard.borrow_mut();
            self.require_state(inner.state, &[ObjectState::Configuring])?;

            if let Err(error) = apply_config(&mut inner.properties, config) {
                self.fault(&mut inner, error.to_string());
                return Err(error);
            }
        }

        let Some(handle) = self.handle() else { return Err(Error::Runtime("object has no live handle during configure".into())) };
        let result = self.call_hook("handle_configure", || self.hooks.handle_configure(&handle, config));

        let mut inner = guard.borrow_mut();
        match result {
            Ok(()) => {
                self.transition(&mut inner, ObjectState::Paused);
                Ok(())
            }
            Err(error) => {
                self.fault(&mut inner, error.to_string());
                Err(error)
            }
        }
    }

    pub fn start(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.require_state(inner.state, &[ObjectState::Paused])?;
        inner.schedule_pending = false;
        self.transition(&mut inner, ObjectState::Waiting);
        drop(inner);
        drop(guard);
        self.recompute_readiness();
        Ok(())
    }

    /// Pause a running node, used internally by link/unlink transactions.
    /// If the node is `scheduled`/`executing`, this blocks until the
    /// in-flight `process()` returns to `waiting` before pausing — a
    /// running `process()` is never interrupted.
    pub fn pause(&self) -> Result<(), Error> {
        let mut guard = self.lock.lock();
        loop {
            let current = guard.borrow().state;
            match current {
                ObjectState::Waiting => break,
                ObjectState::Paused => return Ok(()),
                ObjectState::Scheduled | ObjectState::Executing => {
                    guard = self.lock.wait(guard);
                    continue;
                }
                other => return Err(Error::state(self.id, other, vec![ObjectState::Waiting, ObjectState::Paused])),
            }
        }
        let mut inner = guard.borrow_mut();
        self.transition(&mut inner, ObjectState::Paused);
        Ok(())
    }

    /// Resume a node paused by [`Object::pause`].
    pub fn resume(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        self.require_state(inner.state, &[ObjectState::Paused])?;
        self.transition(&mut inner, ObjectState::Waiting);
        drop(inner);
        drop(guard);
        self.recompute_readiness();
        Ok(())
    }

    pub fn stop(&self) -> Result<(), Error> {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        if inner.state.is_terminal() {
            return Ok(());
        }
        self.require_state(inner.state, &[ObjectState::Paused, ObjectState::Waiting])?;
        self.transition(&mut inner, ObjectState::Stopped);
        self.lock.notify_all();
        Ok(())
    }

    /// Block until `predicate` holds, releasing the object lock while
    /// waiting, then reacquiring it before returning.
    pub fn wait_until(&self, mut predicate: impl FnMut(ObjectState) -> bool) {
        let mut guard = self.lock.lock();
        while !predicate(guard.borrow().state) {
            guard = self.lock.wait(guard);
        }
    }

    /// Recompute whether this node is ready: all outputs ready and
    /// all *required* inputs ready. If it transitions `waiting -> ready`
    /// it is scheduled onto the worker pool exactly once.
    pub fn notify_readiness_changed(&self) {
        self.recompute_readiness();
    }

    fn recompute_readiness(&self) {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();

        if inner.state != ObjectState::Waiting || inner.schedule_pending {
            return;
        }

        let outputs_ready = inner.outputs.iter().all(|port| port.is_ready());
        let inputs_ready = inner.inputs.iter().filter(|port| port.is_required()).all(|port| port.is_ready());

        if outputs_ready && inputs_ready {
            inner.schedule_pending = true;
            self.transition(&mut inner, ObjectState::Scheduled);
            drop(inner);
            drop(guard);
            self.schedule_process();
        }
    }

    fn schedule_process(&self) {
        let Some(handle) = self.handle() else { return };
        self.pool.post(move || handle.run_process());
    }

    fn run_process(self: Arc<Self>) {
        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        if inner.state != ObjectState::Scheduled {
            return;
        }
        self.transition(&mut inner, ObjectState::Executing);
        drop(inner);
        drop(guard);

        let object = Arc::clone(&self);
        let result = self.call_hook("process", move || object.hooks.process(&object));

        let guard = self.lock.lock();
        let mut inner = guard.borrow_mut();
        inner.schedule_pending = false;

        match result {
            Ok(ProcessResult::Blocked | ProcessResult::Finished) => {
                self.transition(&mut inner, ObjectState::Waiting);
                drop(inner);
                drop(guard);
                self.lock.notify_all();
                self.recompute_readiness();
            }
            Ok(ProcessResult::EndOfData) => {
                let object = self.handle();
                drop(inner);
                drop(guard);
                if let Some(object) = object {
                    let _ = object.call_hook("handle_end_of_data", {
                        let object = Arc::clone(&object);
                        move || object.hooks.handle_end_of_data(&object)
                    });
                }
                let guard = self.lock.lock();
                let mut inner = guard.borrow_mut();
                self.transition(&mut inner, ObjectState::Stopped);
                drop(inner);
                drop(guard);
                self.lock.notify_all();
            }
            Err(error) => {
                self.fault(&mut inner, error.to_string());
                drop(inner);
                drop(guard);
                self.lock.notify_all();
            }
        }
    }

    pub fn subscribe_state_changed<F>(&self, handler: F) -> Result<Subscription, Error>
    where
        F: Fn(&ObjectStateChangedEvent) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn subscribe_stopped<F>(&self, handler: F) -> Result<Subscription, Error>
    where
        F: Fn(&ObjectStoppedEvent) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn subscribe_shutdown<F>(&self, handler: F) -> Result<Subscription, Error>
    where
        F: Fn(&ObjectShutdownEvent) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn subscribe_faulted<F>(&self, handler: F) -> Result<Subscription, Error>
    where
        F: Fn(&ObjectFaultedEvent) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Object destruction with live links: drive the node to
    /// `stopped` if it is not already terminal, then unlink every
    /// remaining port link. Called from [`ObjectHandle`]'s `Drop` only
    /// when links remain; an object with no links at drop time needs no
    /// special teardown.
    fn teardown_with_links(&self) {
        if self.being_destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = self.state();
        if !state.is_terminal() {
            let guard = self.lock.lock();
            let mut inner = guard.borrow_mut();
            self.transition(&mut inner, ObjectState::Stopped);
        }

        for output in self.outputs() {
            for link in output.links() {
                crate::link::unlink_one(&link);
            }
        }
        for input in self.inputs() {
            for link in input.links() {
                crate::link::unlink_one(&link);
            }
        }
    }
}

/// The strong-reference type external holders and [`crate::catalog`]/
/// `Network` use to own an [`Object`] as a strong external holder.
///
/// Its `Drop` implements the object-destruction-with-live-links teardown
/// path. This cannot be implemented as `Object`'s own `Drop`: by the time an
/// `Arc<Object>`'s value-drop glue runs, the strong count has already
/// reached zero, and `Weak::upgrade` on `self_weak` would permanently fail
/// — unlike a C++ `shared_ptr` custom deleter, which still observes a
/// live control block. Checking `Arc::strong_count` here, one reference
/// before the real zero, is what makes the self-reference usable during
/// teardown.
pub struct ObjectHandle(Arc<Object>);

impl ObjectHandle {
    pub fn downgrade(&self) -> Weak<Object> {
        Arc::downgrade(&self.0)
    }

    /// Escape hatch to a bare `Arc<Object>` with none of `ObjectHandle`'s
    /// destruction-with-live-links glue. Kept `pub(crate)` — only this
    /// crate's own tests use it, to build throwaway fixtures that are
    /// never linked and dropped well before the test ends. Any real
    /// external holder must stay on `ObjectHandle`, or the object can
    /// drop while still linked and abort in `InputPort`/`OutputPort`'s
    /// `Drop` (see `port.rs`'s `has_links` debug assertion).
    pub(crate) fn into_arc(self) -> Arc<Object> {
        self.0.clone()
    }
}

impl std::ops::Deref for ObjectHandle {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl Clone for ObjectHandle {
    fn clone(&self) -> Self {
        ObjectHandle(Arc::clone(&self.0))
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if Arc::strong_count(&self.0) != 1 {
            return;
        }
        let has_links = self.0.outputs().iter().any(|p| p.has_links()) || self.0.inputs().iter().any(|p| p.has_links());
        if has_links {
            self.0.teardown_with_links();
        }
    }
}

fn apply_config(properties: &mut HashMap<SmolStr, Property>, config: &ObjectConfig) -> Result<(), Error> {
    for (name, value) in config.entries() {
        let property = properties.get_mut(name.as_str()).ok_or_else(|| Error::key_not_found(name.as_str()))?;
        property.set(value.clone())?;
    }
    for property in properties.values() {
        if property.required() && !property.is_defined() {
            return Err(Error::Undefined { name: property.name().to_string() });
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
