// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ra job` - operator view of the queue

use anyhow::Result;
use clap::{Args, Subcommand};

use ra_core::AckWaitStatus;
use ra_daemon::{JobDetail, JobSummary, Query, Request, Response};

use crate::client::{ClientError, DaemonClient};
use crate::output::{format_duration_ms, format_time_ago, or_dash, print_json, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Queue a new job
    Enqueue {
        /// Display name
        name: String,
        /// Job ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Tag an eligible agent must carry (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only agents with protected access may run it
        #[arg(long)]
        protected: bool,
        /// Feature the agent must advertise (repeatable)
        #[arg(long = "requires")]
        required_features: Vec<String>,
    },
    /// Show one job
    Show { id: String },
    /// List jobs in queue order
    List {
        /// Only jobs with this status (pending, running, success, failed, canceled, skipped)
        #[arg(long)]
        status: Option<String>,
    },
    /// Return a job waiting for acknowledgment to the queue
    Release { id: String },
    /// Cancel a job
    Cancel { id: String },
}

pub async fn handle(command: JobCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        JobCommand::Enqueue {
            name,
            id,
            tags,
            protected,
            required_features,
        } => {
            let request = Request::EnqueueJob {
                id,
                name,
                tags,
                protected,
                required_features,
            };
            match client.call(&request).await? {
                Response::JobEnqueued { job } => match format {
                    OutputFormat::Json => print_json(&job)?,
                    OutputFormat::Text => println!("Enqueued job {}", job.id),
                },
                _ => return Err(ClientError::UnexpectedResponse.into()),
            }
        }
        JobCommand::Show { id } => {
            let request = Request::Query {
                query: Query::GetJob { id: id.clone() },
            };
            match client.call(&request).await? {
                Response::Job { job: Some(job) } => match format {
                    OutputFormat::Json => print_json(&job)?,
                    OutputFormat::Text => print!("{}", format_job_detail(&job)),
                },
                Response::Job { job: None } => anyhow::bail!("job not found: {}", id),
                _ => return Err(ClientError::UnexpectedResponse.into()),
            }
        }
        JobCommand::List { status } => {
            let request = Request::Query {
                query: Query::ListJobs { status },
            };
            match client.call(&request).await? {
                Response::Jobs { jobs } => match format {
                    OutputFormat::Json => print_json(&jobs)?,
                    OutputFormat::Text if jobs.is_empty() => println!("No jobs"),
                    OutputFormat::Text => job_table(&jobs).print(),
                },
                _ => return Err(ClientError::UnexpectedResponse.into()),
            }
        }
        JobCommand::Release { id } => {
            let job = updated(client.call(&Request::ReleaseJob { job_id: id }).await?)?;
            match format {
                OutputFormat::Json => print_json(&job)?,
                OutputFormat::Text => println!("Released job {} back to the queue", job.id),
            }
        }
        JobCommand::Cancel { id } => {
            let job = updated(client.call(&Request::CancelJob { job_id: id }).await?)?;
            match format {
                OutputFormat::Json => print_json(&job)?,
                OutputFormat::Text => println!("Canceled job {}", job.id),
            }
        }
    }
    Ok(())
}

fn updated(response: Response) -> Result<Box<JobDetail>, ClientError> {
    match response {
        Response::JobUpdated { job } => Ok(job),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

/// Status with the ack wait folded in: "pending (waiting)".
pub(crate) fn status_label(status: impl std::fmt::Display, waiting: bool) -> String {
    if waiting {
        format!("{status} (waiting)")
    } else {
        status.to_string()
    }
}

pub(crate) fn job_table(jobs: &[JobSummary]) -> Table {
    let mut table = Table::new(vec![
        Column::left("ID").with_max(12),
        Column::left("NAME").with_max(24),
        Column::status("STATUS"),
        Column::left("AGENT"),
        Column::muted("MODE"),
        Column::right("QUEUED"),
    ]);
    for job in jobs {
        table.row(vec![
            job.id.clone(),
            job.name.clone(),
            status_label(job.status, job.ack_wait == AckWaitStatus::Waiting),
            or_dash(job.agent_id.as_deref()),
            job.claim_mode.map_or_else(|| "-".to_string(), |m| m.to_string()),
            format_time_ago(job.queued_at_ms),
        ]);
    }
    table
}

pub(crate) fn format_job_detail(job: &JobDetail) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "Job:       {}", job.id);
    if !job.name.is_empty() {
        let _ = writeln!(out, "Name:      {}", job.name);
    }
    let _ = writeln!(
        out,
        "Status:    {}",
        crate::color::status(&status_label(job.status, job.ack_wait == AckWaitStatus::Waiting))
    );
    if let Some(reason) = job.failure_reason {
        let _ = writeln!(out, "Reason:    {reason}");
    }
    if let Some(mode) = job.claim_mode {
        let _ = writeln!(out, "Mode:      {mode}");
    }
    if let Some(agent) = &job.agent_id {
        let instance = job.worker_instance.as_deref().unwrap_or("?");
        let _ = writeln!(out, "Agent:     {agent} @ {instance}");
    }
    if !job.tags.is_empty() {
        let tags: Vec<_> = job.tags.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Tags:      {}", tags.join(", "));
    }
    if !job.required_features.is_empty() {
        let features: Vec<_> = job.required_features.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Requires:  {}", features.join(", "));
    }
    if job.protected {
        let _ = writeln!(out, "Protected: yes");
    }
    let _ = writeln!(out, "Queued:    {} ago", format_time_ago(job.queued_at_ms));
    if let Some(ms) = job.duration_ms {
        let _ = writeln!(out, "Duration:  {}", format_duration_ms(ms));
    }
    if let Some(run) = &job.run {
        let _ = writeln!(
            out,
            "Run:       {} on {} (started {} ago)",
            run.agent_id,
            run.worker_instance_id,
            format_time_ago(run.started_at_ms)
        );
    }
    out
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
