//! Behavioral specifications for the acknowledgment protocol.
//!
//! These drive the coordinator, store, liveness tracker and reaper together
//! the way the daemon wires them, without a socket in between.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/handshake.rs"]
mod handshake;
#[path = "specs/concurrency.rs"]
mod concurrency;
#[path = "specs/durability.rs"]
mod durability;
#[path = "specs/reaping.rs"]
mod reaping;
