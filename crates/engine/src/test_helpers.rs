// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use crate::{
    AckGate, Assignment, AssignmentCoordinator, CoordinatorConfig, CoordinatorDeps, Reaper,
    ReapPolicy, WorkRequest,
};
use ra_adapters::FakeLiveness;
use ra_core::test_support::{agent_config, job_config};
use ra_core::{
    AgentFeatures, AgentId, Clock, FakeClock, Job, JobConfig, JobId, SequentialIdGen,
    WorkerInstanceId, TWO_PHASE_JOB_COMMIT,
};
use ra_storage::{AgentRegistry, JobStore, WorkItemStore};
use std::time::Duration;

pub(crate) const AGENT: &str = "agent-1";
pub(crate) const CREDENTIAL: &str = "cred-1";
pub(crate) const HOST: &str = "host-a";
pub(crate) const ACK_TTL: Duration = Duration::from_secs(300);

/// Convenience alias for the fully-typed test coordinator.
pub(crate) type TestCoordinator = AssignmentCoordinator<JobStore, FakeLiveness, FakeClock>;

/// Test context holding the coordinator and handles to its collaborators.
pub(crate) struct TestContext {
    pub coordinator: TestCoordinator,
    pub store: JobStore,
    pub liveness: FakeLiveness,
    pub gate: AckGate,
    pub clock: FakeClock,
}

/// In-memory coordinator with the gate on and one registered agent.
pub(crate) fn setup() -> TestContext {
    setup_with(true, CoordinatorConfig::default())
}

pub(crate) fn setup_with(gate_enabled: bool, mut config: CoordinatorConfig) -> TestContext {
    config.ack_ttl = ACK_TTL;
    let store = JobStore::in_memory();
    let liveness = FakeLiveness::new();
    let gate = AckGate::new(gate_enabled);
    let clock = FakeClock::new();
    store
        .register_agent(agent_config(AGENT, CREDENTIAL), clock.epoch_ms())
        .unwrap();
    let coordinator = AssignmentCoordinator::new(
        CoordinatorDeps {
            store: store.clone(),
            liveness: liveness.clone(),
            gate: gate.clone(),
        },
        clock.clone(),
        config,
    );
    TestContext {
        coordinator,
        store,
        liveness,
        gate,
        clock,
    }
}

pub(crate) fn two_phase() -> AgentFeatures {
    AgentFeatures::new().with(TWO_PHASE_JOB_COMMIT, true)
}

pub(crate) fn legacy() -> AgentFeatures {
    AgentFeatures::new()
}

pub(crate) fn host() -> WorkerInstanceId {
    WorkerInstanceId::new(HOST)
}

pub(crate) fn work_request(features: AgentFeatures) -> WorkRequest {
    WorkRequest {
        credential: CREDENTIAL.to_string(),
        worker_instance: host(),
        features,
        job_age: None,
    }
}

impl TestContext {
    pub fn enqueue(&self, id: &str) -> Job {
        self.enqueue_config(job_config(id))
    }

    pub fn enqueue_config(&self, config: JobConfig) -> Job {
        self.store.enqueue(config, self.clock.epoch_ms()).unwrap()
    }

    pub fn register(&self, id: &str, credential: &str) {
        self.store
            .register_agent(agent_config(id, credential), self.clock.epoch_ms())
            .unwrap();
    }

    /// Claim the next job for the default agent; panics if none.
    pub async fn claim(&self, features: AgentFeatures) -> Assignment {
        self.coordinator
            .request_work(work_request(features))
            .await
            .unwrap()
            .expect("a job to claim")
    }

    pub fn job(&self, id: &str) -> Job {
        self.store.get(&JobId::new(id)).expect("job exists")
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::new(AGENT)
    }

    pub fn reaper(
        &self,
        policy: ReapPolicy,
    ) -> Reaper<JobStore, FakeLiveness, FakeClock, SequentialIdGen> {
        Reaper::new(
            self.store.clone(),
            self.liveness.clone(),
            self.clock.clone(),
            SequentialIdGen::new("rotated"),
            policy,
        )
    }
}

/// Drive a future to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}
