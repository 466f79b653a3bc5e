// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assignment coordinator: the job acknowledgment protocol.
//!
//! Every job-state change goes through one conditional store transition.
//! The liveness tracker is consulted as a hint only; when it is missing or
//! unavailable the durable job state decides.

use crate::{AckGate, CoordinatorError};
use ra_adapters::{LivenessTracker, Refresh};
use ra_core::{
    AgentFeatures, AgentFilter, AgentId, ClaimMode, Clock, FailureReason, Job, JobId, JobStatus,
    WorkerInstanceId,
};
use ra_storage::{
    AgentRegistry, ClaimOutcome, ClaimRequest, Expected, Transition, TransitionError,
    WorkItemStore,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Lifetime of a liveness entry between heartbeats.
    pub ack_ttl: Duration,
    /// Ineligible jobs a single claim may skip before giving up.
    pub max_queue_depth: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ack_ttl: Duration::from_secs(300),
            max_queue_depth: 1000,
        }
    }
}

/// Dependencies the coordinator acts on
pub struct CoordinatorDeps<S, L> {
    pub store: S,
    pub liveness: L,
    pub gate: AckGate,
}

/// One poll from an agent
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub credential: String,
    pub worker_instance: WorkerInstanceId,
    pub features: AgentFeatures,
    /// Only hand out jobs queued at least this long.
    pub job_age: Option<Duration>,
}

/// A job handed to an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: JobId,
    pub token: String,
    pub name: String,
    pub mode: ClaimMode,
}

impl Assignment {
    fn from_job(job: &Job, mode: ClaimMode) -> Self {
        Self {
            id: job.id.clone(),
            token: job.token.clone(),
            name: job.name.clone(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    /// This call moved the job to running.
    Started,
    /// The job was already running on the same worker instance.
    AlreadyRunning,
}

/// Terminal result reported by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    pub status: JobStatus,
    pub failure_reason: Option<FailureReason>,
}

impl JobResult {
    pub fn success() -> Self {
        Self {
            status: JobStatus::Success,
            failure_reason: None,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            status: JobStatus::Failed,
            failure_reason: Some(reason),
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: JobStatus::Canceled,
            failure_reason: Some(FailureReason::Canceled),
        }
    }
}

/// What a raw state update turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    Heartbeat,
    Acknowledged(AckOutcome),
    Finished(Box<Job>),
}

/// Protocol engine between polling agents and the work-item store
pub struct AssignmentCoordinator<S, L, C: Clock> {
    store: S,
    liveness: L,
    gate: AckGate,
    clock: C,
    config: CoordinatorConfig,
}

impl<S, L, C> AssignmentCoordinator<S, L, C>
where
    S: WorkItemStore + AgentRegistry,
    L: LivenessTracker,
    C: Clock,
{
    pub fn new(deps: CoordinatorDeps<S, L>, clock: C, config: CoordinatorConfig) -> Self {
        Self {
            store: deps.store,
            liveness: deps.liveness,
            gate: deps.gate,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn liveness(&self) -> &L {
        &self.liveness
    }

    pub fn gate(&self) -> &AckGate {
        &self.gate
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Claim the next eligible job for the polling agent.
    ///
    /// Returns `None` when nothing is claimable or the agent is paused.
    pub async fn request_work(
        &self,
        request: WorkRequest,
    ) -> Result<Option<Assignment>, CoordinatorError> {
        let agent = self
            .store
            .authenticate(&request.credential)
            .ok_or(CoordinatorError::AuthenticationFailed)?;
        let now_ms = self.clock.epoch_ms();
        self.store
            .record_contact(&agent.id, Some(&request.worker_instance), now_ms)?;

        if !agent.active {
            debug!(agent_id = %agent.id, "agent paused, not assigning");
            return Ok(None);
        }

        let mode = if request.features.supports_two_phase() && self.gate.is_enabled() {
            ClaimMode::TwoPhase
        } else {
            ClaimMode::Direct
        };
        let min_age_ms = request.job_age.map(|age| age.as_millis() as u64);
        let claim = ClaimRequest {
            agent_id: agent.id.clone(),
            worker_instance: request.worker_instance.clone(),
            filter: AgentFilter::from_agent(&agent, request.features, min_age_ms),
            mode,
            at_ms: now_ms,
            max_depth: self.config.max_queue_depth,
        };

        let job = match self.store.claim_one(&claim)? {
            ClaimOutcome::Claimed(job) => job,
            ClaimOutcome::Empty => return Ok(None),
            ClaimOutcome::QueueDepthExceeded => {
                return Err(CoordinatorError::Conflict(
                    "queue depth exceeded, retry later".to_string(),
                ))
            }
        };

        info!(
            job_id = %job.id,
            agent_id = %agent.id,
            worker_instance = %request.worker_instance,
            %mode,
            queued_ms = job.queued_duration_ms().unwrap_or(0),
            "job assigned"
        );

        if mode == ClaimMode::TwoPhase {
            if let Err(e) = self
                .liveness
                .put(&job.id, &request.worker_instance, self.config.ack_ttl)
                .await
            {
                warn!(job_id = %job.id, error = %e, "liveness entry not written");
            }
        }

        Ok(Some(Assignment::from_job(&job, mode)))
    }

    /// Keep a two-phase claim alive. Never changes the job.
    ///
    /// A missing liveness entry is recreated from the request's instance,
    /// which must already belong to the assigned agent. The job is read
    /// again after the liveness work: if an acknowledgment or release got
    /// in first, any entry this call wrote is removed and the heartbeat
    /// fails like one sent to a running job.
    pub async fn heartbeat(
        &self,
        job_id: &JobId,
        token: &str,
        worker_instance: Option<&WorkerInstanceId>,
    ) -> Result<(), CoordinatorError> {
        let job = self.authorize(job_id, token)?;
        if !job.is_waiting_for_ack() {
            return Err(CoordinatorError::NotProcessingOnAgent);
        }
        let Some(agent_id) = job.assigned_agent_id else {
            return Err(CoordinatorError::NotProcessingOnAgent);
        };
        if let Some(instance) = worker_instance {
            self.check_instance_owner(&agent_id, instance)?;
        }
        let waiting = Expected::waiting(agent_id.clone()).with_token(token);

        let mut repaired = false;
        match self.liveness.refresh(job_id, self.config.ack_ttl).await {
            Ok(Refresh::Refreshed) => {}
            Ok(Refresh::Missing) => match worker_instance {
                Some(_) if !self.still_matches(job_id, &waiting) => {
                    debug!(%job_id, "job moved on during heartbeat, not repairing");
                }
                Some(instance) => {
                    info!(%job_id, worker_instance = %instance, "recreating missing liveness entry");
                    match self
                        .liveness
                        .put(job_id, instance, self.config.ack_ttl)
                        .await
                    {
                        Ok(()) => repaired = true,
                        Err(e) => warn!(%job_id, error = %e, "liveness repair failed"),
                    }
                }
                None => debug!(%job_id, "liveness entry missing, no instance to repair from"),
            },
            Err(e) => warn!(%job_id, error = %e, "liveness refresh failed"),
        }

        if !self.still_matches(job_id, &waiting) {
            if repaired {
                if let Err(e) = self.liveness.delete(job_id).await {
                    warn!(%job_id, error = %e, "liveness delete failed, entry will expire");
                }
            }
            debug!(%job_id, "job left the waiting state during heartbeat");
            return Err(CoordinatorError::NotProcessingOnAgent);
        }

        self.store
            .record_contact(&agent_id, worker_instance, self.clock.epoch_ms())?;
        Ok(())
    }

    fn still_matches(&self, job_id: &JobId, expected: &Expected) -> bool {
        self.store
            .get(job_id)
            .is_some_and(|job| expected.matches(&job))
    }

    /// Instances are learned from polls; updates may only name known ones.
    fn check_instance_owner(
        &self,
        agent_id: &AgentId,
        instance: &WorkerInstanceId,
    ) -> Result<(), CoordinatorError> {
        let owned = self
            .store
            .agent(agent_id)
            .is_some_and(|agent| agent.has_instance(instance));
        if owned {
            Ok(())
        } else {
            Err(CoordinatorError::BadRequest(format!(
                "worker instance {instance} does not belong to agent {agent_id}"
            )))
        }
    }

    /// Finish the handshake: waiting → running on `worker_instance`.
    ///
    /// Without an instance in the request, the one recorded in the liveness
    /// entry is used. Retrying from the same instance after success is a
    /// no-op.
    pub async fn acknowledge(
        &self,
        job_id: &JobId,
        token: &str,
        worker_instance: Option<&WorkerInstanceId>,
    ) -> Result<AckOutcome, CoordinatorError> {
        let job = self.authorize(job_id, token)?;
        if job.is_terminal() {
            return Err(CoordinatorError::Conflict(format!(
                "job {} already {}",
                job.id, job.status
            )));
        }
        if job.status == JobStatus::Pending && !job.is_waiting_for_ack() {
            return Err(CoordinatorError::NotProcessingOnAgent);
        }

        let instance = self.resolve_instance(job_id, worker_instance).await?;
        if job.status == JobStatus::Running {
            return Self::classify_ack(&job, &instance);
        }

        let Some(agent_id) = job.assigned_agent_id.clone() else {
            return Err(CoordinatorError::NotProcessingOnAgent);
        };
        self.check_instance_owner(&agent_id, &instance)?;

        let now_ms = self.clock.epoch_ms();
        let result = self.store.transition(
            job_id,
            &Expected::waiting(agent_id.clone()).with_token(token),
            Transition::Acknowledge {
                worker_instance: instance.clone(),
            },
            now_ms,
        );
        let job = match result {
            Ok(job) => job,
            Err(TransitionError::Conflict { actual }) => {
                return if actual.token_matches(token) {
                    Self::classify_ack(&actual, &instance)
                } else {
                    Err(CoordinatorError::NotProcessingOnAgent)
                };
            }
            Err(TransitionError::NotFound(_)) => return Err(CoordinatorError::NotProcessingOnAgent),
            Err(TransitionError::Store(e)) => return Err(e.into()),
        };

        if let Err(e) = self.liveness.delete(job_id).await {
            warn!(%job_id, error = %e, "liveness delete failed, entry will expire");
        }
        self.store
            .record_contact(&agent_id, Some(&instance), now_ms)?;
        info!(
            %job_id,
            %agent_id,
            worker_instance = %instance,
            ack_wait_ms = job
                .started_at_ms
                .zip(job.claimed_at_ms)
                .map(|(started, claimed)| started.saturating_sub(claimed))
                .unwrap_or(0),
            "job started"
        );
        Ok(AckOutcome::Started)
    }

    /// Record a terminal result for a running job.
    pub async fn report_result(
        &self,
        job_id: &JobId,
        token: &str,
        result: JobResult,
    ) -> Result<Job, CoordinatorError> {
        if !result.status.is_terminal() {
            return Err(CoordinatorError::BadRequest(format!(
                "{} is not a terminal state",
                result.status
            )));
        }
        let job = self.authorize(job_id, token)?;
        let Some(agent_id) = job.assigned_agent_id.clone() else {
            return Err(Self::not_running(&job));
        };
        if job.status != JobStatus::Running {
            return Err(Self::not_running(&job));
        }

        let failure_reason = match result.status {
            JobStatus::Failed => Some(result.failure_reason.unwrap_or(FailureReason::UnknownFailure)),
            JobStatus::Canceled => Some(FailureReason::Canceled),
            _ => None,
        };
        let job = self
            .store
            .transition(
                job_id,
                &Expected::running(agent_id.clone()).with_token(token),
                Transition::Finish {
                    status: result.status,
                    failure_reason,
                },
                self.clock.epoch_ms(),
            )
            .map_err(|e| match e {
                TransitionError::Conflict { actual } => Self::not_running(&actual),
                TransitionError::NotFound(_) => CoordinatorError::NotProcessingOnAgent,
                TransitionError::Store(e) => e.into(),
            })?;

        info!(
            %job_id,
            %agent_id,
            status = %job.status,
            duration_ms = job.duration_ms().unwrap_or(0),
            "job finished"
        );
        Ok(job)
    }

    /// Single entry point for agent state updates.
    ///
    /// `pending` is a heartbeat, `running` an acknowledgment, and a
    /// terminal state a result report.
    pub async fn update_state(
        &self,
        job_id: &JobId,
        token: &str,
        state: Option<&str>,
        worker_instance: Option<&WorkerInstanceId>,
        failure_reason: Option<&str>,
    ) -> Result<StateUpdate, CoordinatorError> {
        let raw = state
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoordinatorError::BadRequest("missing state".to_string()))?;
        let status = JobStatus::parse(raw)
            .ok_or_else(|| CoordinatorError::BadRequest(format!("unknown state: {raw}")))?;

        match status {
            JobStatus::Pending => {
                self.heartbeat(job_id, token, worker_instance).await?;
                Ok(StateUpdate::Heartbeat)
            }
            JobStatus::Running => self
                .acknowledge(job_id, token, worker_instance)
                .await
                .map(StateUpdate::Acknowledged),
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled => {
                let failure_reason = match failure_reason {
                    Some(raw) => Some(FailureReason::parse(raw).ok_or_else(|| {
                        CoordinatorError::BadRequest(format!("unknown failure reason: {raw}"))
                    })?),
                    None => None,
                };
                let job = self
                    .report_result(
                        job_id,
                        token,
                        JobResult {
                            status,
                            failure_reason,
                        },
                    )
                    .await?;
                Ok(StateUpdate::Finished(Box::new(job)))
            }
            JobStatus::Created => Err(CoordinatorError::BadRequest(
                "created is not a valid update".to_string(),
            )),
        }
    }

    /// Operator cancel of any non-terminal job.
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<Job, CoordinatorError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| CoordinatorError::JobNotFound(job_id.clone()))?;
        if job.is_terminal() {
            return Err(CoordinatorError::Conflict(format!(
                "job {} already {}",
                job.id, job.status
            )));
        }
        let was_waiting = job.is_waiting_for_ack();
        let job = self
            .store
            .transition(
                job_id,
                &Expected::current(&job),
                Transition::Cancel,
                self.clock.epoch_ms(),
            )
            .map_err(|e| transition_to_operator_error(job_id, e))?;
        if was_waiting {
            if let Err(e) = self.liveness.delete(job_id).await {
                warn!(%job_id, error = %e, "liveness delete failed, entry will expire");
            }
        }
        info!(%job_id, "job canceled by operator");
        Ok(job)
    }

    /// Look the job up and check the bearer token.
    fn authorize(&self, job_id: &JobId, token: &str) -> Result<Job, CoordinatorError> {
        match self.store.get(job_id) {
            Some(job) if job.token_matches(token) => Ok(job),
            Some(_) => {
                debug!(%job_id, "token mismatch");
                Err(CoordinatorError::NotProcessingOnAgent)
            }
            None => Err(CoordinatorError::NotProcessingOnAgent),
        }
    }

    async fn resolve_instance(
        &self,
        job_id: &JobId,
        requested: Option<&WorkerInstanceId>,
    ) -> Result<WorkerInstanceId, CoordinatorError> {
        if let Some(instance) = requested {
            return Ok(instance.clone());
        }
        match self.liveness.worker_instance(job_id).await {
            Ok(Some(instance)) => Ok(instance),
            Ok(None) => Err(CoordinatorError::BadRequest(
                "worker instance required".to_string(),
            )),
            Err(e) => {
                warn!(%job_id, error = %e, "liveness lookup failed");
                Err(CoordinatorError::BadRequest(
                    "worker instance required".to_string(),
                ))
            }
        }
    }

    /// Outcome of acknowledging a job that is no longer waiting.
    fn classify_ack(job: &Job, instance: &WorkerInstanceId) -> Result<AckOutcome, CoordinatorError> {
        match job.status {
            JobStatus::Running if job.assigned_worker_instance_id.as_ref() == Some(instance) => {
                Ok(AckOutcome::AlreadyRunning)
            }
            JobStatus::Running => Err(CoordinatorError::Conflict(format!(
                "job {} is running on another worker instance",
                job.id
            ))),
            status if status.is_terminal() => Err(CoordinatorError::Conflict(format!(
                "job {} already {}",
                job.id, status
            ))),
            _ => Err(CoordinatorError::NotProcessingOnAgent),
        }
    }

    fn not_running(job: &Job) -> CoordinatorError {
        if job.status == JobStatus::Pending {
            CoordinatorError::BadRequest(format!("job {} has not started running", job.id))
        } else {
            CoordinatorError::NotProcessingOnAgent
        }
    }
}

/// Map a failed operator transition to an error.
pub(crate) fn transition_to_operator_error(job_id: &JobId, e: TransitionError) -> CoordinatorError {
    match e {
        TransitionError::NotFound(_) => CoordinatorError::JobNotFound(job_id.clone()),
        TransitionError::Conflict { actual } => CoordinatorError::Conflict(format!(
            "job {} changed concurrently (now {}, {})",
            actual.id, actual.status, actual.ack_wait
        )),
        TransitionError::Store(e) => e.into(),
    }
}

#[cfg(test)]
#[path = "coordinator_tests/mod.rs"]
mod tests;
