// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-side commands: `ra request`, `ra signal`, `ra report`
//!
//! These speak for a running agent, so the credential comes from
//! `--credential` or `RA_AGENT_CREDENTIAL`.

use anyhow::Result;
use clap::Args;

use ra_core::{AgentFeatures, TWO_PHASE_JOB_COMMIT};
use ra_daemon::{Request, Response};
use ra_engine::AckOutcome;

use crate::client::{ClientError, DaemonClient};
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct RequestArgs {
    /// Worker instance (host) making the request
    #[arg(long)]
    pub instance: String,
    #[arg(long)]
    pub credential: Option<String>,
    /// Advertise the two-phase commit feature
    #[arg(long)]
    pub two_phase: bool,
    /// Other supported feature (repeatable)
    #[arg(long = "feature")]
    pub features: Vec<String>,
    /// Only take jobs queued at least this long ago
    #[arg(long)]
    pub job_age_secs: Option<u64>,
}

#[derive(Args)]
pub struct SignalArgs {
    pub job_id: String,
    /// Token from the assignment
    #[arg(long)]
    pub token: String,
    /// `pending` to heartbeat, `running` to acknowledge, or a terminal status
    #[arg(long)]
    pub state: String,
    #[arg(long)]
    pub instance: Option<String>,
    #[arg(long)]
    pub failure_reason: Option<String>,
}

#[derive(Args)]
pub struct ReportArgs {
    pub job_id: String,
    #[arg(long)]
    pub token: String,
    /// success, failed, canceled or skipped
    #[arg(long)]
    pub status: String,
    #[arg(long)]
    pub failure_reason: Option<String>,
}

pub(crate) fn features(args: &RequestArgs) -> AgentFeatures {
    args.features
        .iter()
        .map(|name| (name.as_str(), true))
        .chain(args.two_phase.then_some((TWO_PHASE_JOB_COMMIT, true)))
        .collect()
}

fn credential(flag: Option<String>) -> Result<String> {
    flag.or_else(crate::env::agent_credential)
        .ok_or_else(|| anyhow::anyhow!("no credential: pass --credential or set RA_AGENT_CREDENTIAL"))
}

pub async fn request(args: RequestArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let request = Request::RequestWork {
        credential: credential(args.credential.clone())?,
        worker_instance: args.instance.clone(),
        features: features(&args),
        job_age_secs: args.job_age_secs,
    };
    match client.call(&request).await? {
        Response::Assigned { assignment } => match format {
            OutputFormat::Json => print_json(&assignment)?,
            OutputFormat::Text => {
                println!("Assigned job {} ({})", assignment.id, assignment.mode);
                println!("Token: {}", assignment.token);
            }
        },
        Response::NoContent => match format {
            OutputFormat::Json => print_json(&serde_json::Value::Null)?,
            OutputFormat::Text => println!("No work available"),
        },
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    Ok(())
}

pub async fn signal(args: SignalArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let request = Request::Signal {
        job_id: args.job_id.clone(),
        token: args.token,
        state: Some(args.state),
        worker_instance: args.instance,
        failure_reason: args.failure_reason,
    };
    match client.call(&request).await? {
        Response::Ok => match format {
            OutputFormat::Json => print_json(&serde_json::json!({ "heartbeat": args.job_id }))?,
            OutputFormat::Text => println!("Heartbeat recorded for job {}", args.job_id),
        },
        Response::Acknowledged { outcome } => match format {
            OutputFormat::Json => print_json(&serde_json::json!({ "outcome": outcome }))?,
            OutputFormat::Text => println!("{}", ack_message(&args.job_id, outcome)),
        },
        Response::Finished { job } => match format {
            OutputFormat::Json => print_json(&job)?,
            OutputFormat::Text => println!("Job {} finished: {}", job.id, job.status),
        },
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    Ok(())
}

pub async fn report(args: ReportArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let request = Request::ReportResult {
        job_id: args.job_id,
        token: args.token,
        status: args.status,
        failure_reason: args.failure_reason,
    };
    match client.call(&request).await? {
        Response::Finished { job } => match format {
            OutputFormat::Json => print_json(&job)?,
            OutputFormat::Text => println!("Job {} finished: {}", job.id, job.status),
        },
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    Ok(())
}

pub(crate) fn ack_message(job_id: &str, outcome: AckOutcome) -> String {
    match outcome {
        AckOutcome::Started => format!("Job {job_id} acknowledged, now running"),
        AckOutcome::AlreadyRunning => format!("Job {job_id} already running"),
    }
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
