// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable work-item store with atomic claim and conditional transitions.
//!
//! Every mutation runs under one lock: check the precondition against the
//! materialized state, build the event, append it to the WAL, apply it.
//! That makes each claim and each transition a single compare-and-swap.
//! Job and agent changes are fsynced before the call returns; contact
//! timestamps ride along with the next group commit.

use crate::{MaterializedState, Snapshot, SnapshotError, Wal, WalError};
use parking_lot::Mutex;
use ra_core::{
    credential_digest, AckWaitStatus, AgentConfig, AgentFilter, AgentId, AgentRecord, ClaimMode,
    Eligibility, Event, FailureReason, Job, JobConfig, JobId, JobStatus, RunRecord,
    WorkerInstanceId,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job already exists: {0}")]
    DuplicateJob(JobId),
    #[error("agent already exists: {0}")]
    DuplicateAgent(AgentId),
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Why a conditional transition did not apply
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// The job was not in the expected state. Carries what was found.
    #[error("job {} is {} ({})", .actual.id, .actual.status, .actual.ack_wait)]
    Conflict { actual: Box<Job> },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Precondition for a conditional transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    pub status: JobStatus,
    pub ack_wait: AckWaitStatus,
    pub agent_id: Option<AgentId>,
    /// Token the caller authenticated with. A rotated token is a conflict.
    pub token: Option<String>,
}

impl Expected {
    /// Pending, waiting for acknowledgment, claimed by `agent_id`.
    pub fn waiting(agent_id: AgentId) -> Self {
        Self {
            status: JobStatus::Pending,
            ack_wait: AckWaitStatus::Waiting,
            agent_id: Some(agent_id),
            token: None,
        }
    }

    pub fn running(agent_id: AgentId) -> Self {
        Self {
            status: JobStatus::Running,
            ack_wait: AckWaitStatus::NotWaiting,
            agent_id: Some(agent_id),
            token: None,
        }
    }

    /// Pending and unassigned.
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Pending,
            ack_wait: AckWaitStatus::NotWaiting,
            agent_id: None,
            token: None,
        }
    }

    /// Whatever `job` currently is. CAS against an earlier read.
    pub fn current(job: &Job) -> Self {
        Self {
            status: job.status,
            ack_wait: job.ack_wait,
            agent_id: job.assigned_agent_id.clone(),
            token: Some(job.token.clone()),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        job.status == self.status
            && job.ack_wait == self.ack_wait
            && job.assigned_agent_id == self.agent_id
            && match &self.token {
                Some(token) => *token == job.token,
                None => true,
            }
    }
}

/// State change requested by a conditional transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Waiting → running on the given worker instance.
    Acknowledge { worker_instance: WorkerInstanceId },
    /// Waiting → unassigned pending under a fresh token.
    Release { token: String, reason: String },
    /// Running → terminal.
    Finish {
        status: JobStatus,
        failure_reason: Option<FailureReason>,
    },
    /// Any non-terminal → canceled.
    Cancel,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Acknowledge { .. } => "acknowledge",
            Transition::Release { .. } => "release",
            Transition::Finish { .. } => "finish",
            Transition::Cancel => "cancel",
        }
    }

    /// Whether the transition is legal from the job's current state.
    fn allowed_from(&self, job: &Job) -> bool {
        match self {
            Transition::Acknowledge { .. } | Transition::Release { .. } => {
                job.status == JobStatus::Pending && job.is_waiting_for_ack()
            }
            Transition::Finish { status, .. } => {
                status.is_terminal() && job.status == JobStatus::Running
            }
            Transition::Cancel => !job.is_terminal(),
        }
    }

    fn into_event(self, id: JobId, at_ms: u64) -> Event {
        match self {
            Transition::Acknowledge { worker_instance } => Event::JobAcknowledged {
                id,
                worker_instance_id: worker_instance,
                at_ms,
            },
            Transition::Release { token, reason } => Event::JobReleased {
                id,
                token,
                at_ms,
                reason,
            },
            Transition::Finish {
                status,
                failure_reason,
            } => Event::JobFinished {
                id,
                status,
                failure_reason,
                at_ms,
            },
            Transition::Cancel => Event::JobFinished {
                id,
                status: JobStatus::Canceled,
                failure_reason: Some(FailureReason::Canceled),
                at_ms,
            },
        }
    }
}

/// Parameters for one atomic claim attempt
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub agent_id: AgentId,
    pub worker_instance: WorkerInstanceId,
    pub filter: AgentFilter,
    /// Decided by the caller before the claim and recorded on the job.
    pub mode: ClaimMode,
    pub at_ms: u64,
    /// Skipped candidates tolerated before giving up.
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(Box<Job>),
    /// Nothing eligible in the queue.
    Empty,
    /// Too many ineligible jobs ahead; the agent should retry later.
    QueueDepthExceeded,
}

/// Durable record of jobs and their assignment
pub trait WorkItemStore: Send + Sync {
    fn enqueue(&self, config: JobConfig, at_ms: u64) -> Result<Job, StoreError>;

    /// Atomically pick the first eligible pending job and bind it to the
    /// requesting agent. Concurrent callers never receive the same job.
    fn claim_one(&self, request: &ClaimRequest) -> Result<ClaimOutcome, StoreError>;

    /// Apply `transition` only if the job currently matches `expected`.
    fn transition(
        &self,
        id: &JobId,
        expected: &Expected,
        transition: Transition,
        at_ms: u64,
    ) -> Result<Job, TransitionError>;

    fn get(&self, id: &JobId) -> Option<Job>;
    fn jobs(&self) -> Vec<Job>;
    /// Jobs claimed two-phase and not yet acknowledged.
    fn waiting_jobs(&self) -> Vec<Job>;
    fn run_record(&self, id: &JobId) -> Option<RunRecord>;
    fn runs(&self) -> Vec<RunRecord>;
}

/// Registered agents and their credentials
pub trait AgentRegistry: Send + Sync {
    fn register_agent(&self, config: AgentConfig, at_ms: u64) -> Result<AgentRecord, StoreError>;
    fn authenticate(&self, credential: &str) -> Option<AgentRecord>;
    fn record_contact(
        &self,
        id: &AgentId,
        worker_instance: Option<&WorkerInstanceId>,
        at_ms: u64,
    ) -> Result<(), StoreError>;
    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<AgentRecord, StoreError>;
    fn agent(&self, id: &AgentId) -> Option<AgentRecord>;
    fn agents(&self) -> Vec<AgentRecord>;
}

struct StoreInner {
    state: MaterializedState,
    /// `None` for in-memory stores
    wal: Option<Wal>,
}

impl StoreInner {
    /// Append, fsync, then apply. The caller only sees the change once it
    /// would survive a crash; a failed fsync leaves the state untouched.
    fn commit(&mut self, event: Event) -> Result<(), StoreError> {
        if let Some(wal) = self.wal.as_mut() {
            let seq = wal.append(&event)?;
            if let Err(e) = wal.flush() {
                wal.discard_last(seq);
                warn!(event = %event.log_summary(), error = %e, "commit not durable, discarded");
                return Err(e.into());
            }
        }
        debug!(event = %event.log_summary(), "commit");
        self.state.apply_event(&event);
        Ok(())
    }

    /// Append and apply, leaving the fsync to the next group commit.
    /// Only for events whose loss on crash is harmless.
    fn commit_buffered(&mut self, event: Event) -> Result<(), StoreError> {
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&event)?;
        }
        debug!(event = %event.log_summary(), "commit (buffered)");
        self.state.apply_event(&event);
        Ok(())
    }

    fn job(&self, id: &JobId) -> Option<&Job> {
        self.state.jobs.get(id)
    }
}

/// [`WorkItemStore`] and [`AgentRegistry`] over a WAL-backed materialized state.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl JobStore {
    /// Store with no durability, for tests and ephemeral use.
    pub fn in_memory() -> Self {
        Self::from_parts(MaterializedState::default(), None)
    }

    /// Load the snapshot (if any) and replay the WAL after it.
    pub fn open(wal_path: &Path, snapshot_path: &Path) -> Result<Self, StoreError> {
        let (seq, mut state) = match Snapshot::load(snapshot_path)? {
            Some(snapshot) => {
                info!(seq = snapshot.seq, jobs = snapshot.state.jobs.len(), "loaded snapshot");
                (snapshot.seq, snapshot.state)
            }
            None => (0, MaterializedState::default()),
        };

        let wal = Wal::open(wal_path, seq)?;
        let entries = wal.entries_after(seq)?;
        let replayed = entries.len();
        for entry in entries {
            state.apply_event(&entry.event);
        }
        info!(
            replayed,
            write_seq = wal.write_seq(),
            pending = state.pending_len(),
            "store recovered"
        );

        Ok(Self::from_parts(state, Some(wal)))
    }

    fn from_parts(state: MaterializedState, wal: Option<Wal>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner { state, wal })),
        }
    }

    pub fn needs_flush(&self) -> bool {
        self.inner
            .lock()
            .wal
            .as_ref()
            .is_some_and(|wal| wal.needs_flush())
    }

    /// Make every committed event durable.
    pub fn flush(&self) -> Result<(), StoreError> {
        if let Some(wal) = self.inner.lock().wal.as_mut() {
            wal.flush()?;
        }
        Ok(())
    }

    /// Save a snapshot covering everything committed so far, then drop the
    /// WAL entries it covers. Returns the covered sequence.
    pub fn checkpoint(&self, snapshot_path: &Path) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let StoreInner { state, wal } = &mut *inner;
        let Some(wal) = wal.as_mut() else {
            return Ok(0);
        };
        wal.flush()?;
        let seq = wal.write_seq();
        Snapshot::new(seq, state.clone()).save(snapshot_path)?;
        wal.truncate_before(seq + 1)?;
        debug!(seq, "checkpoint saved");
        Ok(seq)
    }

    /// Copy of the full state, for queries and tests.
    pub fn state(&self) -> MaterializedState {
        self.inner.lock().state.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().state.pending_len()
    }
}

impl WorkItemStore for JobStore {
    fn enqueue(&self, config: JobConfig, at_ms: u64) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock();
        let id = JobId::new(config.id.clone());
        if inner.job(&id).is_some() {
            return Err(StoreError::DuplicateJob(id));
        }
        let enqueue_seq = inner.state.next_enqueue_seq();
        inner.commit(Event::JobEnqueued {
            id: id.clone(),
            token: config.token,
            name: config.name,
            tags: config.tags,
            protected: config.protected,
            required_features: config.required_features,
            enqueue_seq,
            at_ms,
        })?;
        inner
            .job(&id)
            .cloned()
            .ok_or(StoreError::DuplicateJob(id))
    }

    fn claim_one(&self, request: &ClaimRequest) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let mut skipped = 0usize;
        let mut resume_after = None;

        loop {
            // Scan under a shared borrow until a candidate needs a commit
            let mut found = None;
            for (seq, id) in inner.state.pending_after(resume_after) {
                let Some(job) = inner.job(id) else {
                    continue;
                };
                match request.filter.evaluate(job, request.at_ms) {
                    Eligibility::Skip(reason) => {
                        skipped += 1;
                        if skipped > request.max_depth {
                            debug!(agent_id = %request.agent_id, skipped, "queue depth exceeded");
                            return Ok(ClaimOutcome::QueueDepthExceeded);
                        }
                        tracing::trace!(job_id = %id, %reason, "skipping job");
                    }
                    Eligibility::Reject(reason) => {
                        found = Some((seq, id.clone(), Some(reason)));
                        break;
                    }
                    Eligibility::Accept => {
                        found = Some((seq, id.clone(), None));
                        break;
                    }
                }
            }

            let Some((seq, id, rejected)) = found else {
                return Ok(ClaimOutcome::Empty);
            };
            if let Some(reason) = rejected {
                info!(job_id = %id, agent_id = %request.agent_id, %reason, "dropping job");
                inner.commit(Event::JobDropped {
                    id,
                    reason,
                    at_ms: request.at_ms,
                })?;
                resume_after = Some(seq);
                continue;
            }

            inner.commit(Event::JobClaimed {
                id: id.clone(),
                agent_id: request.agent_id.clone(),
                worker_instance_id: request.worker_instance.clone(),
                mode: request.mode,
                at_ms: request.at_ms,
            })?;
            return Ok(match inner.job(&id) {
                Some(job) => ClaimOutcome::Claimed(Box::new(job.clone())),
                None => ClaimOutcome::Empty,
            });
        }
    }

    fn transition(
        &self,
        id: &JobId,
        expected: &Expected,
        transition: Transition,
        at_ms: u64,
    ) -> Result<Job, TransitionError> {
        let mut inner = self.inner.lock();
        let job = inner
            .job(id)
            .ok_or_else(|| TransitionError::NotFound(id.clone()))?;
        if !expected.matches(job) || !transition.allowed_from(job) {
            return Err(TransitionError::Conflict {
                actual: Box::new(job.clone()),
            });
        }

        inner.commit(transition.into_event(id.clone(), at_ms))?;
        let job = inner
            .job(id)
            .cloned()
            .ok_or_else(|| TransitionError::NotFound(id.clone()))?;
        debug_assert!(job.check_invariants().is_ok(), "{:?}", job.check_invariants());
        Ok(job)
    }

    fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.lock().job(id).cloned()
    }

    fn jobs(&self) -> Vec<Job> {
        self.inner.lock().state.jobs.values().cloned().collect()
    }

    fn waiting_jobs(&self) -> Vec<Job> {
        self.inner
            .lock()
            .state
            .jobs
            .values()
            .filter(|job| job.is_waiting_for_ack())
            .cloned()
            .collect()
    }

    fn run_record(&self, id: &JobId) -> Option<RunRecord> {
        self.inner.lock().state.runs.get(id).cloned()
    }

    fn runs(&self) -> Vec<RunRecord> {
        self.inner.lock().state.runs.values().cloned().collect()
    }
}

impl AgentRegistry for JobStore {
    fn register_agent(&self, config: AgentConfig, at_ms: u64) -> Result<AgentRecord, StoreError> {
        let mut inner = self.inner.lock();
        let id = AgentId::new(config.id.clone());
        if inner.state.agents.contains_key(&id) {
            return Err(StoreError::DuplicateAgent(id));
        }
        inner.commit(Event::AgentRegistered {
            id: id.clone(),
            name: config.name,
            credential_digest: credential_digest(&config.credential),
            tags: config.tags,
            run_untagged: config.run_untagged,
            access_level: config.access_level,
            at_ms,
        })?;
        inner
            .state
            .agents
            .get(&id)
            .cloned()
            .ok_or(StoreError::AgentNotFound(id))
    }

    fn authenticate(&self, credential: &str) -> Option<AgentRecord> {
        self.inner
            .lock()
            .state
            .agent_by_credential(credential)
            .cloned()
    }

    fn record_contact(
        &self,
        id: &AgentId,
        worker_instance: Option<&WorkerInstanceId>,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.agents.contains_key(id) {
            return Err(StoreError::AgentNotFound(id.clone()));
        }
        inner.commit_buffered(Event::AgentContacted {
            id: id.clone(),
            worker_instance_id: worker_instance.cloned(),
            at_ms,
        })
    }

    fn set_agent_active(&self, id: &AgentId, active: bool) -> Result<AgentRecord, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.agents.contains_key(id) {
            return Err(StoreError::AgentNotFound(id.clone()));
        }
        inner.commit(Event::AgentActivity {
            id: id.clone(),
            active,
        })?;
        inner
            .state
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::AgentNotFound(id.clone()))
    }

    fn agent(&self, id: &AgentId) -> Option<AgentRecord> {
        self.inner.lock().state.agents.get(id).cloned()
    }

    fn agents(&self) -> Vec<AgentRecord> {
        self.inner.lock().state.agents.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "store_tests/mod.rs"]
mod tests;
