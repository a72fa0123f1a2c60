// SPDX-License-Identifier: LGPL-3.0-or-later

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clypsalot-core: object lifecycle, port linking, and network shutdown
//! plumbing for dataflow networks.
//!
//! This crate is the core: the object state machine, typed ports and
//! atomic link/unlink transactions, the event bus and message processor,
//! the shared worker pool, and the catalog/module registration surface.
//! The network supervisor itself lives in the sibling `clypsalot-network`
//! crate.

#[macro_use]
pub mod macros;

pub mod catalog;
pub mod error;
pub mod event;
pub mod id;
pub mod link;
pub mod log;
pub mod message;
pub mod object;
pub mod port;
pub mod property;
pub mod sync;
pub mod thread_pool;

pub use catalog::{Catalog, CatalogEntryAdded, Module, ObjectDescriptor, PortTypeDescriptor};
pub use error::{Error, KeyErrorReason, MutexError};
pub use event::{EventBus, Subscription};
pub use id::ObjectId;
pub use link::{link_ports, unlink_ports, PortPair};
pub use log::{deliver, LogEvent, Severity};
pub use message::MessageProcessor;
pub use object::{
    Object, ObjectFaultedEvent, ObjectHandle, ObjectHooks, ObjectShutdownEvent, ObjectState, ObjectStateChangedEvent,
    ObjectStoppedEvent, ProcessResult,
};
pub use port::{InputPort, OutputPort, Port, PortLink, PortType};
pub use property::{size_from_integer, AnyValue, ObjectConfig, Property, PropertyType};
pub use sync::{DebugMutex, ReentrantLock};
pub use thread_pool::WorkerPool;
