// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::liveness::{LivenessError, LivenessTracker, Refresh};
use async_trait::async_trait;
use ra_core::{JobId, WorkerInstanceId};
use std::time::Duration;
use tracing::Instrument;

/// Wrapper that adds tracing to any LivenessTracker
#[derive(Clone)]
pub struct TracedLiveness<L> {
    inner: L,
}

impl<L> TracedLiveness<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: LivenessTracker> LivenessTracker for TracedLiveness<L> {
    async fn put(
        &self,
        job: &JobId,
        worker_instance: &WorkerInstanceId,
        ttl: Duration,
    ) -> Result<(), LivenessError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.put(job, worker_instance, ttl).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::debug!(ttl_secs = ttl.as_secs(), elapsed_ms, "entry written"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "put failed"),
            }
            result
        }
        .instrument(tracing::info_span!("liveness.put", %job, %worker_instance))
        .await
    }

    async fn refresh(&self, job: &JobId, ttl: Duration) -> Result<Refresh, LivenessError> {
        let result = self.inner.refresh(job, ttl).await;
        tracing::info_span!("liveness.refresh", %job).in_scope(|| match &result {
            Ok(Refresh::Refreshed) => tracing::trace!("refreshed"),
            Ok(Refresh::Missing) => tracing::info!("entry missing"),
            Err(e) => tracing::warn!(error = %e, "refresh failed"),
        });
        result
    }

    async fn delete(&self, job: &JobId) -> Result<(), LivenessError> {
        let result = self.inner.delete(job).await;
        tracing::info_span!("liveness.delete", %job).in_scope(|| match &result {
            Ok(()) => tracing::debug!("deleted"),
            Err(e) => tracing::warn!(error = %e, "delete failed (entry will expire)"),
        });
        result
    }

    async fn exists(&self, job: &JobId) -> Result<bool, LivenessError> {
        let result = self.inner.exists(job).await;
        tracing::trace!(%job, exists = ?result.as_ref().ok(), "checked");
        result
    }

    async fn worker_instance(
        &self,
        job: &JobId,
    ) -> Result<Option<WorkerInstanceId>, LivenessError> {
        let result = self.inner.worker_instance(job).await;
        if let Err(ref e) = result {
            tracing::warn!(%job, error = %e, "worker_instance lookup failed");
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
