//! Worker pool specs.

mod reentrant_call;
