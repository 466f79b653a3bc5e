// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ra ping` and `ra status`

use anyhow::Result;

use ra_daemon::{Request, Response, StatusOverview};

use crate::client::{ClientError, DaemonClient};
use crate::output::{format_elapsed, print_json, OutputFormat};

pub async fn ping(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match client.call(&Request::Ping).await? {
        Response::Pong => {}
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    let version = client.hello().await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "version": version }))?,
        OutputFormat::Text => println!("pong (rad {version})"),
    }
    Ok(())
}

pub async fn handle(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;
    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Text => print!("{}", format_status(&status)),
    }
    Ok(())
}

pub(crate) fn format_status(status: &StatusOverview) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "rad up {}", format_elapsed(status.uptime_secs));
    let _ = writeln!(
        out,
        "jobs:   {} queued, {} waiting for ack, {} running, {} finished",
        status.jobs_queued, status.jobs_waiting, status.jobs_running, status.jobs_finished
    );
    let _ = writeln!(
        out,
        "agents: {} registered, {} active",
        status.agents, status.agents_active
    );
    let gate = if status.ack_gate { "on" } else { "off" };
    let _ = writeln!(out, "two-phase ack: {}", crate::color::status(gate));
    let _ = writeln!(out, "reaper: {}", status.reap_policy);
    out
}
