// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Release of stalled two-phase claims.
//!
//! A job whose claimant stopped heartbeating stays waiting until something
//! releases it. The sweep does that for jobs whose liveness entry is gone,
//! rotating the bearer token so the vanished claimant can no longer act.

use crate::coordinator::transition_to_operator_error;
use crate::CoordinatorError;
use ra_adapters::LivenessTracker;
use ra_core::{Clock, IdGen, Job, JobId};
use ra_storage::{Expected, Transition, TransitionError, WorkItemStore};
use std::time::Duration;
use tracing::{debug, info, warn};

/// When stalled handshakes are released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReapPolicy {
    /// Never automatically; operators release jobs by hand.
    #[default]
    Manual,
    /// Once the liveness entry is gone and the claim is older than this.
    ReleaseAfter(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub released: Vec<JobId>,
    /// Waiting jobs left alone (live entry, within grace, or lookup failed).
    pub kept: usize,
}

pub struct Reaper<S, L, C: Clock, G: IdGen> {
    store: S,
    liveness: L,
    clock: C,
    id_gen: G,
    policy: ReapPolicy,
}

impl<S, L, C, G> Reaper<S, L, C, G>
where
    S: WorkItemStore,
    L: LivenessTracker,
    C: Clock,
    G: IdGen,
{
    pub fn new(store: S, liveness: L, clock: C, id_gen: G, policy: ReapPolicy) -> Self {
        Self {
            store,
            liveness,
            clock,
            id_gen,
            policy,
        }
    }

    pub fn policy(&self) -> ReapPolicy {
        self.policy
    }

    /// Release every waiting job whose claimant has gone quiet.
    pub async fn sweep(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let ReapPolicy::ReleaseAfter(grace) = self.policy else {
            return report;
        };
        let now_ms = self.clock.epoch_ms();
        let grace_ms = grace.as_millis() as u64;

        for job in self.store.waiting_jobs() {
            let claimed_at = job.claimed_at_ms.unwrap_or(job.queued_at_ms);
            if now_ms.saturating_sub(claimed_at) < grace_ms {
                report.kept += 1;
                continue;
            }
            match self.liveness.exists(&job.id).await {
                Ok(false) => {}
                Ok(true) => {
                    report.kept += 1;
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "liveness check failed, keeping claim");
                    report.kept += 1;
                    continue;
                }
            }
            match self.release(&job, "liveness lost", now_ms) {
                Ok(_) => report.released.push(job.id.clone()),
                Err(TransitionError::Conflict { actual }) => {
                    debug!(job_id = %actual.id, status = %actual.status, "job moved on before release");
                }
                Err(e) => warn!(job_id = %job.id, error = %e, "release failed"),
            }
        }

        if !report.released.is_empty() {
            info!(released = report.released.len(), kept = report.kept, "reaper sweep");
        }
        report
    }

    /// Operator release of a job waiting for acknowledgment.
    pub async fn release_job(&self, job_id: &JobId) -> Result<Job, CoordinatorError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| CoordinatorError::JobNotFound(job_id.clone()))?;
        if !job.is_waiting_for_ack() {
            return Err(CoordinatorError::Conflict(format!(
                "job {} is not waiting for acknowledgment",
                job.id
            )));
        }
        let released = self
            .release(&job, "operator release", self.clock.epoch_ms())
            .map_err(|e| transition_to_operator_error(job_id, e))?;
        if let Err(e) = self.liveness.delete(job_id).await {
            warn!(%job_id, error = %e, "liveness delete failed, entry will expire");
        }
        Ok(released)
    }

    fn release(&self, job: &Job, reason: &str, now_ms: u64) -> Result<Job, TransitionError> {
        let released = self.store.transition(
            &job.id,
            &Expected::current(job),
            Transition::Release {
                token: self.id_gen.secret(),
                reason: reason.to_string(),
            },
            now_ms,
        )?;
        info!(
            job_id = %job.id,
            agent_id = job.assigned_agent_id.as_ref().map(|a| a.as_str()).unwrap_or("-"),
            reason,
            "job released"
        );
        Ok(released)
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
