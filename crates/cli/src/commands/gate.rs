// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ra gate` - the two-phase acknowledgment switch

use anyhow::Result;
use clap::{Args, Subcommand};

use ra_daemon::{Query, Request, Response};

use crate::client::{ClientError, DaemonClient};
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct GateArgs {
    #[command(subcommand)]
    pub command: GateCommand,
}

#[derive(Subcommand)]
pub enum GateCommand {
    /// Offer two-phase claims to agents that support them
    On,
    /// Hand out every claim directly
    Off,
    /// Show the current setting
    Show,
}

pub async fn handle(command: GateCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let request = match command {
        GateCommand::On => Request::SetAckGate { enabled: true },
        GateCommand::Off => Request::SetAckGate { enabled: false },
        GateCommand::Show => Request::Query {
            query: Query::GateStatus,
        },
    };
    match client.call(&request).await? {
        Response::Gate { enabled, previous } => match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "enabled": enabled,
                "previous": previous,
            }))?,
            OutputFormat::Text => println!("{}", gate_message(enabled, previous)),
        },
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    Ok(())
}

pub(crate) fn gate_message(enabled: bool, previous: Option<bool>) -> String {
    let state = crate::color::status(if enabled { "on" } else { "off" });
    match previous {
        Some(was) if was == enabled => format!("Two-phase acknowledgment already {state}"),
        Some(_) => format!("Two-phase acknowledgment turned {state}"),
        None => format!("Two-phase acknowledgment is {state}"),
    }
}
