// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Each accepted connection gets its own task, so a slow agent never holds
//! up another. Handlers call straight into the coordinator; all ordering
//! between agents is settled by the store's conditional transitions.

mod admin;
mod agent;
mod query;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use std::time::Instant;

use ra_core::UuidIdGen;
use ra_engine::{CoordinatorError, StatusClass};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::lifecycle::Services;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Shared context for request handlers
pub struct ListenCtx {
    pub services: Services,
    pub id_gen: UuidIdGen,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

impl ListenCtx {
    pub fn new(services: Services, shutdown: Arc<Notify>) -> Self {
        Self {
            services,
            id_gen: UuidIdGen,
            start_time: Instant::now(),
            shutdown,
        }
    }
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: ListenCtx) -> Self {
        Self {
            socket,
            ctx: Arc::new(ctx),
        }
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Queries and polls are frequent
    match &request {
        Request::Query { .. } | Request::RequestWork { .. } | Request::Ping => {
            debug!(request = request_name(&request), "received request")
        }
        _ => info!(request = request_name(&request), "received request"),
    }

    let response = handle_request(request, ctx).await;
    debug!(status = %response.status(), "sending response");

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

/// Request kind for logs. Credentials and tokens stay out of the log.
fn request_name(request: &Request) -> &'static str {
    match request {
        Request::Ping => "ping",
        Request::Hello { .. } => "hello",
        Request::Status => "status",
        Request::Shutdown => "shutdown",
        Request::RequestWork { .. } => "request_work",
        Request::Signal { .. } => "signal",
        Request::ReportResult { .. } => "report_result",
        Request::EnqueueJob { .. } => "enqueue_job",
        Request::RegisterAgent { .. } => "register_agent",
        Request::SetAgentActive { .. } => "set_agent_active",
        Request::ReleaseJob { .. } => "release_job",
        Request::CancelJob { .. } => "cancel_job",
        Request::SetAckGate { .. } => "set_ack_gate",
        Request::Query { .. } => "query",
    }
}

/// Handle a single request and return a response.
pub(crate) async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => query::handle_status(ctx),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::RequestWork {
            credential,
            worker_instance,
            features,
            job_age_secs,
        } => {
            agent::handle_request_work(ctx, credential, worker_instance, features, job_age_secs)
                .await
        }

        Request::Signal {
            job_id,
            token,
            state,
            worker_instance,
            failure_reason,
        } => {
            agent::handle_signal(
                ctx,
                &job_id,
                &token,
                state.as_deref(),
                worker_instance,
                failure_reason.as_deref(),
            )
            .await
        }

        Request::ReportResult {
            job_id,
            token,
            status,
            failure_reason,
        } => {
            agent::handle_report_result(ctx, &job_id, &token, &status, failure_reason.as_deref())
                .await
        }

        Request::EnqueueJob {
            id,
            name,
            tags,
            protected,
            required_features,
        } => admin::handle_enqueue(ctx, id, name, tags, protected, required_features),

        Request::RegisterAgent {
            id,
            name,
            credential,
            tags,
            run_untagged,
            access_level,
        } => admin::handle_register_agent(
            ctx,
            admin::AgentRegistration {
                id,
                name,
                credential,
                tags,
                run_untagged,
                access_level,
            },
        ),

        Request::SetAgentActive { agent_id, active } => {
            admin::handle_set_agent_active(ctx, &agent_id, active)
        }

        Request::ReleaseJob { job_id } => admin::handle_release(ctx, &job_id).await,

        Request::CancelJob { job_id } => admin::handle_cancel(ctx, &job_id).await,

        Request::SetAckGate { enabled } => admin::handle_set_gate(ctx, enabled),

        Request::Query { query } => query::handle_query(ctx, query),
    }
}

/// Map a coordinator error onto its protocol status class.
fn error_response(e: CoordinatorError) -> Response {
    let status = e.status();
    if status == StatusClass::Internal {
        error!(error = %e, "request failed");
    } else {
        debug!(%status, error = %e, "request rejected");
    }
    Response::error(status, e.to_string())
}

#[cfg(test)]
#[path = "../listener_tests/mod.rs"]
mod tests;
