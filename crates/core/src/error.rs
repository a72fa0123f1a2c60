// SPDX-License-Identifier: LGPL-3.0-or-later

//! The core error taxonomy.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. The
//! variants below are not exception types in the C++ sense — they are a
//! closed set of ways a core operation can fail, named by failure kind
//! rather than by the usual Rust idiom of one variant per call site.

use crate::id::ObjectId;
use crate::object::ObjectState;
use thiserror::Error;

/// The closed error taxonomy for all of `clypsalot-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A catalog lookup missed, or an insert collided with an existing key.
    #[error("key error: {key:?} {reason}")]
    Key { key: String, reason: KeyErrorReason },

    /// A port type mismatch, or an `AnyValue` failed to coerce into a
    /// property's declared type.
    #[error("type error: {0}")]
    Type(String),

    /// A structurally invalid value (e.g. a negative `Size`).
    #[error("value error: {0}")]
    Value(String),

    /// A read of a property that has never been given a value.
    #[error("property {name:?} is undefined")]
    Undefined { name: String },

    /// A `publicMutable == false` property was written through the public
    /// write path.
    #[error("property {name:?} is not publicly mutable")]
    Immutable { name: String },

    /// An operation was attempted while the targeted object was in a state
    /// that does not permit it.
    #[error("object {object} is {actual}, expected one of {expected:?}")]
    State { object: ObjectId, actual: ObjectState, expected: Vec<ObjectState> },

    /// `link_ports` was asked to create a link that already exists between
    /// the given output and input.
    #[error("a link already exists between {output} and {input}")]
    DuplicateLink { output: String, input: String },

    /// A catch-all for invariants violated by callers (misuse of the public
    /// API in a way no other variant names precisely).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A debug-build lock discipline violation: double-lock by the owning
    /// thread, or unlock attempted by a thread that does not hold the lock.
    #[error("mutex error: {0}")]
    Mutex(#[from] MutexError),
}

/// Why a [`Error::Key`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyErrorReason {
    NotFound,
    AlreadyExists,
}

crate::simple_display! {
    KeyErrorReason {
        NotFound => "not found",
        AlreadyExists => "already exists",
    }
}

/// Debug-build lock discipline violations, raised by the debug-build
/// mutex wrapper.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MutexError {
    #[error("thread attempted to lock a mutex it already holds")]
    DoubleLock,
    #[error("thread attempted to unlock a mutex it does not hold")]
    UnlockByNonOwner,
}

impl Error {
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::Key { key: key.into(), reason: KeyErrorReason::NotFound }
    }

    pub fn key_already_exists(key: impl Into<String>) -> Self {
        Self::Key { key: key.into(), reason: KeyErrorReason::AlreadyExists }
    }

    pub fn state(object: ObjectId, actual: ObjectState, expected: Vec<ObjectState>) -> Self {
        Self::State { object, actual, expected }
    }
}
