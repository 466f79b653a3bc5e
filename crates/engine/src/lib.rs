// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Job acknowledgment protocol engine

mod coordinator;
mod error;
mod gate;
mod reaper;
mod status;

#[cfg(test)]
mod test_helpers;

pub use coordinator::{
    AckOutcome, Assignment, AssignmentCoordinator, CoordinatorConfig, CoordinatorDeps, JobResult,
    StateUpdate, WorkRequest,
};
pub use error::CoordinatorError;
pub use gate::AckGate;
pub use reaper::{ReapPolicy, ReapReport, Reaper};
pub use status::StatusClass;
