// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake liveness store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LivenessError, LivenessTracker, Refresh};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use ra_core::{JobId, WorkerInstanceId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Recorded liveness call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessCall {
    Put {
        job: JobId,
        worker_instance: WorkerInstanceId,
        ttl: Duration,
    },
    Refresh {
        job: JobId,
        ttl: Duration,
    },
    Delete {
        job: JobId,
    },
    Exists {
        job: JobId,
    },
    WorkerInstance {
        job: JobId,
    },
}

#[derive(Default)]
struct FakeLivenessState {
    entries: HashMap<JobId, WorkerInstanceId>,
    calls: Vec<LivenessCall>,
    failing: bool,
    refresh_hold: Option<Arc<Notify>>,
    put_hold: Option<Arc<Notify>>,
}

/// Liveness store with no clock: entries live until deleted or `expire`d.
#[derive(Clone, Default)]
pub struct FakeLiveness {
    inner: Arc<Mutex<FakeLivenessState>>,
}

impl FakeLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<LivenessCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make every subsequent call fail with [`LivenessError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    /// Simulate the TTL running out.
    pub fn expire(&self, job: &JobId) {
        self.inner.lock().entries.remove(job);
    }

    /// Park the next `refresh` after it has looked up the entry, until the
    /// returned handle is notified.
    pub fn hold_next_refresh(&self) -> Arc<Notify> {
        let hold = Arc::new(Notify::new());
        self.inner.lock().refresh_hold = Some(Arc::clone(&hold));
        hold
    }

    /// Park the next `put` before it writes the entry, until the returned
    /// handle is notified.
    pub fn hold_next_put(&self) -> Arc<Notify> {
        let hold = Arc::new(Notify::new());
        self.inner.lock().put_hold = Some(Arc::clone(&hold));
        hold
    }

    /// Current entry, bypassing call recording.
    pub fn entry(&self, job: &JobId) -> Option<WorkerInstanceId> {
        self.inner.lock().entries.get(job).cloned()
    }

    fn record(
        &self,
        call: LivenessCall,
    ) -> Result<MutexGuard<'_, FakeLivenessState>, LivenessError> {
        let mut state = self.inner.lock();
        state.calls.push(call);
        if state.failing {
            return Err(LivenessError::Unavailable("fake failure".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl LivenessTracker for FakeLiveness {
    async fn put(
        &self,
        job: &JobId,
        worker_instance: &WorkerInstanceId,
        ttl: Duration,
    ) -> Result<(), LivenessError> {
        let hold = self
            .record(LivenessCall::Put {
                job: job.clone(),
                worker_instance: worker_instance.clone(),
                ttl,
            })?
            .put_hold
            .take();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        self.inner
            .lock()
            .entries
            .insert(job.clone(), worker_instance.clone());
        Ok(())
    }

    async fn refresh(&self, job: &JobId, ttl: Duration) -> Result<Refresh, LivenessError> {
        let (result, hold) = {
            let mut state = self.record(LivenessCall::Refresh {
                job: job.clone(),
                ttl,
            })?;
            let result = if state.entries.contains_key(job) {
                Refresh::Refreshed
            } else {
                Refresh::Missing
            };
            (result, state.refresh_hold.take())
        };
        if let Some(hold) = hold {
            hold.notified().await;
        }
        Ok(result)
    }

    async fn delete(&self, job: &JobId) -> Result<(), LivenessError> {
        let mut state = self.record(LivenessCall::Delete { job: job.clone() })?;
        state.entries.remove(job);
        Ok(())
    }

    async fn exists(&self, job: &JobId) -> Result<bool, LivenessError> {
        let state = self.record(LivenessCall::Exists { job: job.clone() })?;
        Ok(state.entries.contains_key(job))
    }

    async fn worker_instance(
        &self,
        job: &JobId,
    ) -> Result<Option<WorkerInstanceId>, LivenessError> {
        let state = self.record(LivenessCall::WorkerInstance { job: job.clone() })?;
        Ok(state.entries.get(job).cloned())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
