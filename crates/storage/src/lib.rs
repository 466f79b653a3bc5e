// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for runack: write-ahead log, snapshots and the job store

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError};
pub use state::MaterializedState;
pub use store::{
    AgentRegistry, ClaimOutcome, ClaimRequest, Expected, JobStore, StoreError, Transition,
    TransitionError, WorkItemStore,
};
pub use wal::{Wal, WalEntry, WalError};
