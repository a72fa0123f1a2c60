// SPDX-License-Identifier: LGPL-3.0-or-later

//! Ports, links, and the port-type registry.
//!
//! Ports are owned by their parent [`crate::object::Object`]; a
//! [`PortLink`] is owned jointly by the two ports it connects and refers
//! back to them (and to their owning objects) only weakly, so a link never
//! extends an object's lifetime beyond what a user reference already does.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smol_str::SmolStr;

use crate::error::Error;
use crate::object::Object;

/// A registered port type: a name unique in the catalog, and the factory
/// that type-checks and allocates a concrete link between one of this
/// type's output ports and one of its input ports.
///
/// Identity is by reference (an `Arc<PortType>` obtained from the
/// catalog), not by name — two `PortType`s with the same name are never
/// simultaneously registered, so the two notions of identity coincide in
/// practice.
pub struct PortType {
    name: SmolStr,
    make_link: Box<dyn Fn(&Arc<OutputPort>, &Arc<InputPort>) -> Result<PortLink, Error> + Send + Sync>,
}

impl PortType {
    pub fn new<F>(name: impl Into<SmolStr>, make_link: F) -> Self
    where
        F: Fn(&Arc<OutputPort>, &Arc<InputPort>) -> Result<PortLink, Error> + Send + Sync + 'static,
    {
        Self { name: name.into(), make_link: Box::new(make_link) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn make_link(&self, output: &Arc<OutputPort>, input: &Arc<InputPort>) -> Result<PortLink, Error> {
        (self.make_link)(output, input)
    }
}

impl fmt::Debug for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortType").field("name", &self.name).finish()
    }
}

/// Behavior shared by [`InputPort`] and [`OutputPort`]; direction is
/// encoded as two disjoint variant types rather than a single enum field.
pub trait Port {
    fn name(&self) -> &str;
    fn port_type(&self) -> &Arc<PortType>;
    fn parent(&self) -> Option<Arc<Object>>;
    fn is_ready(&self) -> bool;
    /// Links this port currently participates in.
    fn links(&self) -> Vec<Arc<PortLink>>;
}

macro_rules! define_port {
    ($name:ident) => {
        pub struct $name {
            name: SmolStr,
            port_type: Arc<PortType>,
            parent: Weak<Object>,
            ready: AtomicBool,
            required: bool,
            links: Mutex<Vec<Arc<PortLink>>>,
        }

        impl $name {
            pub fn new(name: impl Into<SmolStr>, port_type: Arc<PortType>, parent: Weak<Object>) -> Self {
                Self::with_required(name, port_type, parent, true)
            }

            /// `required` only matters for [`InputPort`]s: an object's
            /// readiness predicate only consults the required inputs
            /// Kept on both port directions for a uniform constructor.
            pub fn with_required(name: impl Into<SmolStr>, port_type: Arc<PortType>, parent: Weak<Object>, required: bool) -> Self {
                Self { name: name.into(), port_type, parent, ready: AtomicBool::new(true), required, links: Mutex::new(Vec::new()) }
            }

            pub fn is_required(&self) -> bool {
                self.required
            }

            /// Set the port's ready flag. If it actually changes, the
            /// owning object's readiness predicate is recomputed
            /// Readiness is recomputed whenever a port's ready flag changes.
            pub fn set_ready(&self, ready: bool) {
                let previous = self.ready.swap(ready, Ordering::SeqCst);
                if previous != ready {
                    if let Some(parent) = self.parent.upgrade() {
                        parent.notify_readiness_changed();
                    }
                }
            }

            pub(crate) fn add_link(&self, link: Arc<PortLink>) {
                self.links.lock().push(link);
            }

            pub(crate) fn remove_link(&self, link: &Arc<PortLink>) -> bool {
                let mut links = self.links.lock();
                if let Some(pos) = links.iter().position(|l| Arc::ptr_eq(l, link)) {
                    links.remove(pos);
                    true
                } else {
                    false
                }
            }

            /// Destroying a port with a non-empty link list is a fatal
            /// programmer error; callers must `unlink_ports` first.
            pub fn has_links(&self) -> bool {
                !self.links.lock().is_empty()
            }
        }

        impl Port for $name {
            fn name(&self) -> &str {
                &self.name
            }

            fn port_type(&self) -> &Arc<PortType> {
                &self.port_type
            }

            fn parent(&self) -> Option<Arc<Object>> {
                self.parent.upgrade()
            }

            fn is_ready(&self) -> bool {
                self.ready.load(Ordering::SeqCst)
            }

            fn links(&self) -> Vec<Arc<PortLink>> {
                self.links.lock().clone()
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                debug_assert!(
                    self.links.lock().is_empty(),
                    "port {:?} dropped while still holding links — unlink_ports must run first",
                    self.name
                );
            }
        }
    };
}

define_port!(InputPort);
define_port!(OutputPort);

/// A directed connection from an [`OutputPort`] to an [`InputPort`]
/// Held jointly by the two ports it connects; references back to
/// the ports (and their owning objects) are weak so a link never keeps a
/// dead object's memory alive.
pub struct PortLink {
    from: Weak<OutputPort>,
    to: Weak<InputPort>,
    end_of_data: Mutex<bool>,
}

impl PortLink {
    pub fn new(from: &Arc<OutputPort>, to: &Arc<InputPort>) -> Self {
        Self { from: Arc::downgrade(from), to: Arc::downgrade(to), end_of_data: Mutex::new(false) }
    }

    pub fn from(&self) -> Option<Arc<OutputPort>> {
        self.from.upgrade()
    }

    pub fn to(&self) -> Option<Arc<InputPort>> {
        self.to.upgrade()
    }

    pub fn end_of_data(&self) -> bool {
        *self.end_of_data.lock()
    }

    /// Mark the link as having delivered its last unit of data, and
    /// recompute both endpoints' owning objects' readiness via
    /// `on_link_data_available`: any change on a link notifies both
    /// owners, each at most once per change.
    pub fn set_end_of_data(&self) {
        let mut flag = self.end_of_data.lock();
        if *flag {
            return;
        }
        *flag = true;
        drop(flag);
        self.on_link_data_available();
    }

    /// Signal that this link's data-availability state changed (end of
    /// data, or in the future a data-pushed notification). Recomputes the
    /// readiness predicate of both endpoints' owning objects exactly once
    /// per call.
    pub fn on_link_data_available(&self) {
        if let Some(from) = self.from() {
            if let Some(parent) = from.parent() {
                parent.notify_readiness_changed();
            }
        }
        if let Some(to) = self.to() {
            if let Some(parent) = to.parent() {
                parent.notify_readiness_changed();
            }
        }
    }
}

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
