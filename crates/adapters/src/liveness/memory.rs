// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process TTL liveness store.

use super::{LivenessError, LivenessTracker, Refresh};
use async_trait::async_trait;
use parking_lot::Mutex;
use ra_core::{Clock, JobId, WorkerInstanceId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    worker_instance: WorkerInstanceId,
    expires_at: Instant,
}

/// Liveness entries held in memory, expired against the injected clock.
///
/// Expired entries are evicted when touched and by [`purge_expired`].
///
/// [`purge_expired`]: MemoryLiveness::purge_expired
#[derive(Clone)]
pub struct MemoryLiveness<C: Clock> {
    entries: Arc<Mutex<HashMap<JobId, Entry>>>,
    clock: C,
}

impl<C: Clock> MemoryLiveness<C> {
    pub fn new(clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Live entries, expired ones excluded.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` on the live entry for `job`, evicting it first if expired.
    fn with_live<T>(&self, job: &JobId, f: impl FnOnce(&mut Entry) -> T) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get_mut(job) {
            Some(entry) if entry.expires_at > now => Some(f(entry)),
            Some(_) => {
                entries.remove(job);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<C: Clock> LivenessTracker for MemoryLiveness<C> {
    async fn put(
        &self,
        job: &JobId,
        worker_instance: &WorkerInstanceId,
        ttl: Duration,
    ) -> Result<(), LivenessError> {
        let expires_at = self.clock.now() + ttl;
        self.entries.lock().insert(
            job.clone(),
            Entry {
                worker_instance: worker_instance.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn refresh(&self, job: &JobId, ttl: Duration) -> Result<Refresh, LivenessError> {
        let expires_at = self.clock.now() + ttl;
        Ok(
            match self.with_live(job, |entry| entry.expires_at = expires_at) {
                Some(()) => Refresh::Refreshed,
                None => Refresh::Missing,
            },
        )
    }

    async fn delete(&self, job: &JobId) -> Result<(), LivenessError> {
        self.entries.lock().remove(job);
        Ok(())
    }

    async fn exists(&self, job: &JobId) -> Result<bool, LivenessError> {
        Ok(self.with_live(job, |_| ()).is_some())
    }

    async fn worker_instance(
        &self,
        job: &JobId,
    ) -> Result<Option<WorkerInstanceId>, LivenessError> {
        Ok(self.with_live(job, |entry| entry.worker_instance.clone()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
