// SPDX-License-Identifier: LGPL-3.0-or-later

//! Synchronous fan-out event bus with lifetime-scoped subscriptions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::Error;

type Handler = Arc<dyn Fn(&dyn Any) -> Result<(), Error> + Send + Sync>;

struct Slot {
    handler: Weak<dyn Fn(&dyn Any) -> Result<(), Error> + Send + Sync>,
}

/// A per-owner, fixed-type-set event bus.
///
/// Event types must be [`EventBus::register`]ed before anything can
/// subscribe or send — a closed set the owner declares at construction.
pub struct EventBus {
    subscribers: Mutex<HashMap<TypeId, Vec<Slot>>>,
}

/// Keeps a subscriber alive on the bus it was created from. Dropping it
/// unsubscribes; the bus only notices on its next `send`/`cleanup` —
/// cleanup of dead subscribers is lazy.
#[must_use = "dropping a Subscription immediately unsubscribes it"]
pub struct Subscription {
    // Held only to keep the handler's Arc alive; the bus refers to it weakly.
    _handler: Handler,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()) }
    }

    /// Declare that events of type `E` may be sent on this bus. Fails if
    /// `E` is already registered.
    pub fn register<E: 'static>(&self) -> Result<(), Error> {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&TypeId::of::<E>()) {
            return Err(Error::key_already_exists(std::any::type_name::<E>()));
        }
        subscribers.insert(TypeId::of::<E>(), Vec::new());
        Ok(())
    }

    /// Subscribe `handler` to events of type `E`. Fails if `E` was never
    /// registered.
    #[allow(clippy::expect_used)]
    pub fn subscribe<E, F>(&self, handler: F) -> Result<Subscription, Error>
    where
        E: 'static,
        F: Fn(&E) -> Result<(), Error> + Send + Sync + 'static,
    {
        let wrapped: Handler = Arc::new(move |event: &dyn Any| {
            // `send::<E>` is the only caller of this closure and always passes the E it was registered under
            let event = event.downcast_ref::<E>().expect("event bus dispatched the wrong concrete type");
            handler(event)
        });

        let mut subscribers = self.subscribers.lock();
        let slots = subscribers.get_mut(&TypeId::of::<E>()).ok_or_else(|| Error::key_not_found(std::any::type_name::<E>()))?;
        slots.push(Slot { handler: Arc::downgrade(&wrapped) });

        Ok(Subscription { _handler: wrapped })
    }

    /// Deliver `event` to every live subscriber of `E`, in subscription
    /// order, inline on the calling thread. Stops and propagates the
    /// first handler failure.
    pub fn send<E: 'static>(&self, event: &E) -> Result<(), Error> {
        let handlers: Vec<Handler> = {
            let mut subscribers = self.subscribers.lock();
            let slots = subscribers.get_mut(&TypeId::of::<E>()).ok_or_else(|| Error::key_not_found(std::any::type_name::<E>()))?;
            slots.retain(|slot| slot.handler.upgrade().is_some());
            slots.iter().filter_map(|slot| slot.handler.upgrade()).collect()
        };

        for handler in handlers {
            handler(event)?;
        }
        Ok(())
    }

    /// Drop subscriber slots whose handle has already gone away, for
    /// every registered event type. Exposed for tests.
    pub fn cleanup(&self) {
        let mut subscribers = self.subscribers.lock();
        for slots in subscribers.values_mut() {
            slots.retain(|slot| slot.handler.upgrade().is_some());
        }
    }

    /// Count of live subscriber slots for `E`, ignoring dead ones. Exposed
    /// for tests.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers.get(&TypeId::of::<E>()).map(|slots| slots.iter().filter(|slot| slot.handler.upgrade().is_some()).count()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
