// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run record: which worker instance executed which job.

use crate::agent::{AgentId, WorkerInstanceId};
use crate::job::{JobId, JobStatus};
use serde::{Deserialize, Serialize};

/// Created exactly once when a job enters `running`; closed on terminal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: JobId,
    pub agent_id: AgentId,
    pub worker_instance_id: WorkerInstanceId,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl RunRecord {
    pub fn open(
        job_id: JobId,
        agent_id: AgentId,
        worker_instance_id: WorkerInstanceId,
        started_at_ms: u64,
    ) -> Self {
        Self {
            job_id,
            agent_id,
            worker_instance_id,
            started_at_ms,
            finished_at_ms: None,
            status: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.finished_at_ms.is_none()
    }

    /// Close the run. A closed run keeps its first outcome.
    pub fn close(&mut self, status: JobStatus, finished_at_ms: u64) {
        if self.is_open() {
            self.finished_at_ms = Some(finished_at_ms);
            self.status = Some(status);
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at_ms
            .map(|end| end.saturating_sub(self.started_at_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunRecord {
        RunRecord::open(
            JobId::new("job-1"),
            AgentId::new("agent-1"),
            WorkerInstanceId::new("host-a"),
            1_000,
        )
    }

    #[test]
    fn open_run_has_no_outcome() {
        let run = run();
        assert!(run.is_open());
        assert_eq!(run.duration_ms(), None);
    }

    #[test]
    fn close_sets_outcome_once() {
        let mut run = run();
        run.close(JobStatus::Success, 4_500);
        run.close(JobStatus::Failed, 9_000);
        assert!(!run.is_open());
        assert_eq!(run.status, Some(JobStatus::Success));
        assert_eq!(run.duration_ms(), Some(3_500));
    }
}
