//! Test harness for behavioral specifications.
//!
//! A `World` is one daemon's worth of services: store, in-memory liveness on
//! a fake clock, the coordinator and a reaper.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::Path;
use std::time::Duration;

use ra_adapters::MemoryLiveness;
use ra_core::test_support::{agent_config, job_config};
use ra_core::{
    AgentFeatures, Clock, FakeClock, Job, JobId, SequentialIdGen, WorkerInstanceId,
    TWO_PHASE_JOB_COMMIT,
};
use ra_engine::{
    AckGate, Assignment, AssignmentCoordinator, CoordinatorConfig, CoordinatorDeps, ReapPolicy,
    Reaper, WorkRequest,
};
use ra_storage::{AgentRegistry, JobStore, WorkItemStore};

pub const ACK_TTL: Duration = Duration::from_secs(30);
pub const GRACE: Duration = Duration::from_secs(60);

pub type Liveness = MemoryLiveness<FakeClock>;

pub struct World {
    pub store: JobStore,
    pub liveness: Liveness,
    pub clock: FakeClock,
    pub coordinator: AssignmentCoordinator<JobStore, Liveness, FakeClock>,
    pub reaper: Reaper<JobStore, Liveness, FakeClock, SequentialIdGen>,
}

impl World {
    /// Gate on, nothing registered, in-memory store.
    pub fn new() -> Self {
        Self::with_store(JobStore::in_memory(), FakeClock::new())
    }

    /// Open (or reopen) an on-disk store under `dir`.
    pub fn on_disk(dir: &Path, clock: FakeClock) -> Self {
        let store = JobStore::open(&dir.join("wal/events.wal"), &dir.join("snapshot.json")).unwrap();
        Self::with_store(store, clock)
    }

    pub fn with_store(store: JobStore, clock: FakeClock) -> Self {
        let liveness = MemoryLiveness::new(clock.clone());
        let coordinator = AssignmentCoordinator::new(
            CoordinatorDeps {
                store: store.clone(),
                liveness: liveness.clone(),
                gate: AckGate::new(true),
            },
            clock.clone(),
            CoordinatorConfig {
                ack_ttl: ACK_TTL,
                ..CoordinatorConfig::default()
            },
        );
        let reaper = Reaper::new(
            store.clone(),
            liveness.clone(),
            clock.clone(),
            SequentialIdGen::new("reissued"),
            ReapPolicy::ReleaseAfter(GRACE),
        );
        Self {
            store,
            liveness,
            clock,
            coordinator,
            reaper,
        }
    }

    pub fn register(&self, id: &str, credential: &str) {
        self.store
            .register_agent(agent_config(id, credential), self.clock.epoch_ms())
            .unwrap();
    }

    pub fn enqueue(&self, id: &str) -> Job {
        self.store
            .enqueue(job_config(id), self.clock.epoch_ms())
            .unwrap()
    }

    pub fn job(&self, id: &str) -> Job {
        self.store.get(&JobId::new(id)).expect("job exists")
    }

    pub async fn poll(&self, credential: &str, host: &str, two_phase: bool) -> Option<Assignment> {
        self.coordinator
            .request_work(request(credential, host, two_phase))
            .await
            .unwrap()
    }
}

pub fn request(credential: &str, host: &str, two_phase: bool) -> WorkRequest {
    WorkRequest {
        credential: credential.to_string(),
        worker_instance: WorkerInstanceId::new(host),
        features: AgentFeatures::new().with(TWO_PHASE_JOB_COMMIT, two_phase),
        job_age: None,
    }
}

pub fn instance(host: &str) -> WorkerInstanceId {
    WorkerInstanceId::new(host)
}
