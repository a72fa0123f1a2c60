// SPDX-License-Identifier: LGPL-3.0-or-later

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clypsalot-network: the network supervisor.
//!
//! Starts and stops the managed nodes of a dataflow network, watches their
//! shutdown events on the shared worker pool, and blocks `run()` until the
//! reachable downstream subgraph of at least one shutdown node has fully
//! drained.

pub mod network;

pub use network::Network;
