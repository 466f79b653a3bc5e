// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Eligibility of a pending job for a polling agent.

use crate::agent::{AccessLevel, AgentRecord};
use crate::features::AgentFeatures;
use crate::job::{FailureReason, Job};
use std::collections::BTreeSet;
use std::fmt;

/// Why a candidate was passed over without being touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TagMismatch,
    Untagged,
    Unprotected,
    TooYoung,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TagMismatch => write!(f, "tag mismatch"),
            SkipReason::Untagged => write!(f, "untagged"),
            SkipReason::Unprotected => write!(f, "unprotected"),
            SkipReason::TooYoung => write!(f, "too young"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Accept,
    /// Leave the job in the queue for another agent.
    Skip(SkipReason),
    /// The job can never run here; drop it as failed.
    Reject(FailureReason),
}

/// Per-request view of what an agent can run.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub tags: BTreeSet<String>,
    pub run_untagged: bool,
    pub access_level: AccessLevel,
    /// Only jobs queued at least this long are eligible.
    pub min_job_age_ms: Option<u64>,
    pub features: AgentFeatures,
}

impl AgentFilter {
    pub fn from_agent(
        agent: &AgentRecord,
        features: AgentFeatures,
        min_job_age_ms: Option<u64>,
    ) -> Self {
        Self {
            tags: agent.tags.clone(),
            run_untagged: agent.run_untagged,
            access_level: agent.access_level,
            min_job_age_ms,
            features,
        }
    }

    pub fn evaluate(&self, job: &Job, now_ms: u64) -> Eligibility {
        if job.tags.is_empty() {
            if !self.run_untagged {
                return Eligibility::Skip(SkipReason::Untagged);
            }
        } else if !job.tags.is_subset(&self.tags) {
            return Eligibility::Skip(SkipReason::TagMismatch);
        }
        if self.access_level == AccessLevel::RefProtected && !job.protected {
            return Eligibility::Skip(SkipReason::Unprotected);
        }
        if let Some(min_age) = self.min_job_age_ms {
            if now_ms.saturating_sub(job.queued_at_ms) < min_age {
                return Eligibility::Skip(SkipReason::TooYoung);
            }
        }
        if !self.features.missing(&job.required_features).is_empty() {
            return Eligibility::Reject(FailureReason::RunnerUnsupported);
        }
        Eligibility::Accept
    }
}

#[cfg(test)]
#[path = "matching_tests.rs"]
mod tests;
