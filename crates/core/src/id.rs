// SPDX-License-Identifier: LGPL-3.0-or-later

//! Process-unique, monotonically increasing identifiers.
//!
//! Objects are identified by a `u64` minted from a single process-wide
//! counter rather than a random string: the cross-object lock-ordering
//! rule sorts objects by id, and that only works if ids are totally
//! ordered and cheap to compare.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an [`crate::object::Object`].
///
/// `0` is reserved as a sentinel for "no object" (used while tearing down a
/// link whose peer object has already been destroyed) and is never returned
/// by [`ObjectId::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Mint the next id in process-wide monotonic order.
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The reserved "no object" sentinel.
    pub const fn none() -> Self {
        Self(0)
    }

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
