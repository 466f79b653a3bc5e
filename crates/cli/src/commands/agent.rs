// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ra agent` - register and manage agents

use anyhow::Result;
use clap::{Args, Subcommand};

use ra_core::AccessLevel;
use ra_daemon::{AgentSummary, Query, Request, Response};

use crate::client::{ClientError, DaemonClient};
use crate::output::{format_time_ago, print_json, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Register a new agent and print its credential
    Register {
        id: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Credential to use (generated when omitted)
        #[arg(long)]
        credential: Option<String>,
        /// Tag this agent carries (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Also take jobs without tags
        #[arg(long)]
        run_untagged: bool,
        /// Only run protected jobs
        #[arg(long)]
        protected: bool,
    },
    /// List registered agents
    List {},
    /// Stop handing work to an agent
    Pause { id: String },
    /// Resume handing work to an agent
    Resume { id: String },
}

pub async fn handle(
    command: AgentCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        AgentCommand::Register {
            id,
            name,
            credential,
            tags,
            run_untagged,
            protected,
        } => {
            let request = Request::RegisterAgent {
                id,
                name,
                credential,
                tags,
                run_untagged,
                access_level: if protected {
                    AccessLevel::RefProtected
                } else {
                    AccessLevel::NotProtected
                },
            };
            match client.call(&request).await? {
                Response::AgentRegistered { agent, credential } => match format {
                    OutputFormat::Json => print_json(&serde_json::json!({
                        "agent": agent,
                        "credential": credential,
                    }))?,
                    OutputFormat::Text => {
                        println!("Registered agent {}", agent.id);
                        println!("Credential: {credential}");
                    }
                },
                _ => return Err(ClientError::UnexpectedResponse.into()),
            }
        }
        AgentCommand::List {} => {
            let request = Request::Query {
                query: Query::ListAgents,
            };
            match client.call(&request).await? {
                Response::Agents { agents } => match format {
                    OutputFormat::Json => print_json(&agents)?,
                    OutputFormat::Text if agents.is_empty() => println!("No agents registered"),
                    OutputFormat::Text => agent_table(&agents).print(),
                },
                _ => return Err(ClientError::UnexpectedResponse.into()),
            }
        }
        AgentCommand::Pause { id } => set_active(client, id, false, format).await?,
        AgentCommand::Resume { id } => set_active(client, id, true, format).await?,
    }
    Ok(())
}

async fn set_active(
    client: &DaemonClient,
    agent_id: String,
    active: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = Request::SetAgentActive { agent_id, active };
    match client.call(&request).await? {
        Response::Agent { agent } => match format {
            OutputFormat::Json => print_json(&agent)?,
            OutputFormat::Text if active => println!("Agent {} resumed", agent.id),
            OutputFormat::Text => println!("Agent {} paused", agent.id),
        },
        _ => return Err(ClientError::UnexpectedResponse.into()),
    }
    Ok(())
}

pub(crate) fn agent_table(agents: &[AgentSummary]) -> Table {
    let mut table = Table::new(vec![
        Column::left("ID"),
        Column::status("STATE"),
        Column::left("TAGS").with_max(24),
        Column::muted("ACCESS"),
        Column::right("SEEN"),
        Column::left("INSTANCES"),
    ]);
    for agent in agents {
        let tags: Vec<&str> = agent.tags.iter().map(String::as_str).collect();
        let mut tag_cell = tags.join(",");
        if agent.run_untagged {
            tag_cell = if tag_cell.is_empty() {
                "*".to_string()
            } else {
                format!("{tag_cell},*")
            };
        }
        table.row(vec![
            agent.id.clone(),
            if agent.active { "active" } else { "paused" }.to_string(),
            if tag_cell.is_empty() { "-".to_string() } else { tag_cell },
            agent.access_level.to_string(),
            format_time_ago(agent.contacted_at_ms.unwrap_or(0)),
            agent.instances.join(","),
        ]);
    }
    table
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
