// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ra-core: Core types for the runack job acknowledgment protocol

pub mod agent;
pub mod clock;
pub mod event;
pub mod features;
pub mod id;
pub mod job;
pub mod matching;
pub mod run;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{
    credential_digest, AccessLevel, AgentConfig, AgentId, AgentRecord, WorkerInstance,
    WorkerInstanceId,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::Event;
pub use features::{AgentFeatures, TWO_PHASE_JOB_COMMIT};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{
    AckWaitStatus, ClaimMode, FailureReason, InvariantViolation, Job, JobConfig, JobId, JobStatus,
};
pub use matching::{AgentFilter, Eligibility, SkipReason};
pub use run::RunRecord;
