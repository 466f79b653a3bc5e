// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op liveness store.

use super::{LivenessError, LivenessTracker, Refresh};
use async_trait::async_trait;
use ra_core::{JobId, WorkerInstanceId};
use std::time::Duration;

/// Liveness store that keeps nothing.
///
/// Writes succeed and every read reports the entry missing, which is how an
/// unreachable liveness backend looks to the protocol.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLiveness;

impl NoOpLiveness {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LivenessTracker for NoOpLiveness {
    async fn put(
        &self,
        _job: &JobId,
        _worker_instance: &WorkerInstanceId,
        _ttl: Duration,
    ) -> Result<(), LivenessError> {
        Ok(())
    }

    async fn refresh(&self, _job: &JobId, _ttl: Duration) -> Result<Refresh, LivenessError> {
        Ok(Refresh::Missing)
    }

    async fn delete(&self, _job: &JobId) -> Result<(), LivenessError> {
        Ok(())
    }

    async fn exists(&self, _job: &JobId) -> Result<bool, LivenessError> {
        Ok(false)
    }

    async fn worker_instance(
        &self,
        _job: &JobId,
    ) -> Result<Option<WorkerInstanceId>, LivenessError> {
        Ok(None)
    }
}
