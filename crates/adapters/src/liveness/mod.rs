// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness tracking for jobs awaiting acknowledgment.
//!
//! A liveness entry is keyed by job id, names the worker instance that is
//! mid-handshake and expires after a TTL unless refreshed by a heartbeat.
//! Entries are hints: losing one never changes a job's durable state.

mod memory;
mod noop;

pub use memory::MemoryLiveness;
pub use noop::NoOpLiveness;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLiveness, LivenessCall};

use async_trait::async_trait;
use ra_core::{JobId, WorkerInstanceId};
use std::time::Duration;
use thiserror::Error;

/// Errors from liveness operations
#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("liveness store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of refreshing an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Refreshed,
    /// No live entry; it expired, was deleted, or was never written.
    Missing,
}

/// Ephemeral TTL store of in-flight acknowledgments
#[async_trait]
pub trait LivenessTracker: Clone + Send + Sync + 'static {
    /// Create or overwrite the entry for `job`.
    async fn put(
        &self,
        job: &JobId,
        worker_instance: &WorkerInstanceId,
        ttl: Duration,
    ) -> Result<(), LivenessError>;

    /// Extend a live entry. Never recreates a missing one.
    async fn refresh(&self, job: &JobId, ttl: Duration) -> Result<Refresh, LivenessError>;

    async fn delete(&self, job: &JobId) -> Result<(), LivenessError>;

    async fn exists(&self, job: &JobId) -> Result<bool, LivenessError>;

    /// Worker instance recorded in a live entry.
    async fn worker_instance(
        &self,
        job: &JobId,
    ) -> Result<Option<WorkerInstanceId>, LivenessError>;
}
