// SPDX-License-Identifier: LGPL-3.0-or-later

//! Name-keyed, append-only registries for port types and object kinds,
//! plus the `Module`/`import_module` boundary that bulk-inserts entries
//! into the process-wide catalogs.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::error::Error;
use crate::event::{EventBus, Subscription};
use crate::object::ObjectHandle;
use crate::port::PortType;
use crate::thread_pool::WorkerPool;

/// Emitted once per successful [`Catalog::insert`], for UI integrations
/// that want to react to new catalog entries.
#[derive(Debug, Clone)]
pub struct CatalogEntryAdded {
    pub name: SmolStr,
}

/// A name→value registry, safe for concurrent reads and serialised
/// writes. Used for both the port-type catalog (`Catalog<PortType>`)
/// and the object catalog (`Catalog<ObjectDescriptor>`).
pub struct Catalog<T> {
    entries: RwLock<HashMap<SmolStr, Arc<T>>>,
    events: EventBus,
}

impl<T> Catalog<T> {
    // a freshly constructed EventBus has no registrations yet, so this can never collide
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let events = EventBus::new();
        events.register::<CatalogEntryAdded>().expect("fresh EventBus registration cannot collide");
        Self { entries: RwLock::new(HashMap::new()), events }
    }

    /// Insert under `name`. Fails with [`Error::Key`] if the name is
    /// already taken — catalogs are append-only.
    pub fn insert(&self, name: impl Into<SmolStr>, value: Arc<T>) -> Result<(), Error> {
        let name = name.into();
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&name) {
                return Err(Error::key_already_exists(name.as_str()));
            }
            entries.insert(name.clone(), value);
        }
        self.events.send(&CatalogEntryAdded { name })
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, Error> {
        self.entries.read().get(name).cloned().ok_or_else(|| Error::key_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn subscribe_entry_added<F>(&self, handler: F) -> Result<Subscription, Error>
    where
        F: Fn(&CatalogEntryAdded) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A catalog entry for an object kind: a stable `kind` name and the
/// factory that builds a fresh [`ObjectHandle`] bound to the given
/// worker pool.
pub struct ObjectDescriptor {
    pub kind: SmolStr,
    make: Box<dyn Fn(Arc<WorkerPool>) -> ObjectHandle + Send + Sync>,
}

impl ObjectDescriptor {
    pub fn new<F>(kind: impl Into<SmolStr>, make: F) -> Self
    where
        F: Fn(Arc<WorkerPool>) -> ObjectHandle + Send + Sync + 'static,
    {
        Self { kind: kind.into(), make: Box::new(make) }
    }

    pub fn make(&self, pool: Arc<WorkerPool>) -> ObjectHandle {
        (self.make)(pool)
    }
}

impl Catalog<ObjectDescriptor> {
    /// Build a fresh object of `kind` bound to `pool`. Fails with
    /// [`Error::Key`] if `kind` was never registered.
    pub fn make(&self, kind: &str, pool: Arc<WorkerPool>) -> Result<ObjectHandle, Error> {
        Ok(self.get(kind)?.make(pool))
    }
}

impl Catalog<PortType> {
    /// Alias for [`Catalog::get`] under the name port-type lookups are
    /// conventionally called by.
    pub fn instance(&self, name: &str) -> Result<Arc<PortType>, Error> {
        self.get(name)
    }
}

/// A catalog entry for a port type: just the type's name plus the
/// `PortType` value itself. Kept as a thin wrapper so `Module`
/// reads symmetrically with [`ObjectDescriptor`].
pub struct PortTypeDescriptor {
    pub port_type: Arc<PortType>,
}

impl PortTypeDescriptor {
    pub fn new(port_type: Arc<PortType>) -> Self {
        Self { port_type }
    }
}

/// A module: a bundle of port types and object kinds to import into the
/// process-wide catalogs in one call.
#[derive(Default)]
pub struct Module {
    pub port_types: Vec<PortTypeDescriptor>,
    pub objects: Vec<Arc<ObjectDescriptor>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port_type(mut self, port_type: Arc<PortType>) -> Self {
        self.port_types.push(PortTypeDescriptor::new(port_type));
        self
    }

    pub fn with_object(mut self, descriptor: ObjectDescriptor) -> Self {
        self.objects.push(Arc::new(descriptor));
        self
    }
}

static PORT_TYPES: OnceLock<Catalog<PortType>> = OnceLock::new();
static OBJECTS: OnceLock<Catalog<ObjectDescriptor>> = OnceLock::new();

/// The process-wide port-type catalog.
pub fn port_type_catalog() -> &'static Catalog<PortType> {
    PORT_TYPES.get_or_init(Catalog::new)
}

/// The process-wide object-kind catalog.
pub fn object_catalog() -> &'static Catalog<ObjectDescriptor> {
    OBJECTS.get_or_init(Catalog::new)
}

/// Insert every entry of `module` into the process-wide catalogs. Not
/// transactional across entries: a failure partway through leaves the
/// entries already inserted in place; each entry is independently
/// append-only.
pub fn import_module(module: &Module) -> Result<(), Error> {
    for descriptor in &module.port_types {
        crate::log::deliver(
            "clypsalot::module",
            file!(),
            line!(),
            crate::log::Severity::Trace,
            &format!("found port type in module: {}", descriptor.port_type.name()),
        );
        port_type_catalog().insert(descriptor.port_type.name(), Arc::clone(&descriptor.port_type))?;
    }

    for descriptor in &module.objects {
        crate::log::deliver(
            "clypsalot::module",
            file!(),
            line!(),
            crate::log::Severity::Trace,
            &format!("found object kind in module: {}", descriptor.kind),
        );
        object_catalog().insert(descriptor.kind.clone(), Arc::clone(descriptor))?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
