// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ra - run acknowledgment CLI
//!
//! Talks to `rad` over its Unix socket. Operators use it to queue jobs and
//! manage agents; scripts use `ra request`/`ra signal`/`ra report` to act
//! as an agent.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cli_log;
mod client;
mod color;
mod commands;
mod env;
mod output;
mod table;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{agent, gate, job, status, work};
use output::OutputFormat;

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "ra",
    version,
    disable_version_flag = true,
    about = "Hand queued jobs to agents, with two-phase acknowledgment"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    /// Print version
    #[allow(dead_code)]
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon is answering
    Ping,
    /// Show queue and agent counts
    Status,
    /// Job management
    Job(job::JobArgs),
    /// Agent management
    Agent(agent::AgentArgs),
    /// Two-phase acknowledgment switch
    Gate(gate::GateArgs),
    /// Ask for a job (as an agent)
    Request(work::RequestArgs),
    /// Heartbeat, acknowledge or finish a claimed job (as an agent)
    Signal(work::SignalArgs),
    /// Report the result of a running job (as an agent)
    Report(work::ReportArgs),
}

fn cli_command() -> clap::Command {
    Cli::command()
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(1);
    }
}

/// Render an anyhow error, skipping the cause chain when the top-level
/// message already includes it.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let matches = cli_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let format = cli.output;

    let Some(command) = cli.command else {
        cli_command().print_help()?;
        println!();
        return Ok(());
    };

    let client = DaemonClient::connect()?;
    match command {
        Commands::Ping => status::ping(&client, format).await?,
        Commands::Status => status::handle(&client, format).await?,
        Commands::Job(args) => job::handle(args.command, &client, format).await?,
        Commands::Agent(args) => agent::handle(args.command, &client, format).await?,
        Commands::Gate(args) => gate::handle(args.command, &client, format).await?,
        Commands::Request(args) => work::request(args, &client, format).await?,
        Commands::Signal(args) => work::signal(args, &client, format).await?,
        Commands::Report(args) => work::report(args, &client, format).await?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
