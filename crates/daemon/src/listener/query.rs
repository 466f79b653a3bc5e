// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers.

use ra_core::{JobId, JobStatus};
use ra_engine::{ReapPolicy, StatusClass};
use ra_storage::{AgentRegistry, WorkItemStore};

use super::ListenCtx;
use crate::protocol::{AgentSummary, JobDetail, JobSummary, Query, Response, StatusOverview};

pub(super) fn handle_query(ctx: &ListenCtx, query: Query) -> Response {
    let services = &ctx.services;
    match query {
        Query::ListJobs { status } => {
            let status = match status.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => match JobStatus::parse(raw) {
                    Some(status) => Some(status),
                    None => {
                        return Response::error(
                            StatusClass::BadRequest,
                            format!("unknown status: {raw}"),
                        )
                    }
                },
            };
            let mut jobs = services.store.jobs();
            if let Some(status) = status {
                jobs.retain(|job| job.status == status);
            }
            jobs.sort_by_key(|job| job.enqueue_seq);
            Response::Jobs {
                jobs: jobs.iter().map(JobSummary::from).collect(),
            }
        }

        Query::GetJob { id } => {
            let id = JobId::new(id);
            let job = services.store.get(&id).map(|job| {
                let run = services.store.run_record(&id);
                Box::new(JobDetail::new(&job, run))
            });
            Response::Job { job }
        }

        Query::ListAgents => Response::Agents {
            agents: services
                .store
                .agents()
                .iter()
                .map(AgentSummary::from)
                .collect(),
        },

        Query::ListRuns => {
            let mut runs = services.store.runs();
            runs.sort_by_key(|run| run.started_at_ms);
            Response::Runs { runs }
        }

        Query::GateStatus => Response::Gate {
            enabled: services.coordinator.gate().is_enabled(),
            previous: None,
        },
    }
}

pub(super) fn handle_status(ctx: &ListenCtx) -> Response {
    let services = &ctx.services;
    let state = services.store.state();
    let mut overview = StatusOverview {
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        agents: state.agents.len(),
        agents_active: state.agents.values().filter(|a| a.active).count(),
        ack_gate: services.coordinator.gate().is_enabled(),
        reap_policy: match services.reaper.policy() {
            ReapPolicy::Manual => "manual".to_string(),
            ReapPolicy::ReleaseAfter(grace) => format!("after {}s", grace.as_secs()),
        },
        ..Default::default()
    };
    for job in state.jobs.values() {
        if job.is_terminal() {
            overview.jobs_finished += 1;
        } else if job.status == JobStatus::Running {
            overview.jobs_running += 1;
        } else if job.is_waiting_for_ack() {
            overview.jobs_waiting += 1;
        } else if job.is_claimable() {
            overview.jobs_queued += 1;
        }
    }
    Response::Status { status: overview }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
