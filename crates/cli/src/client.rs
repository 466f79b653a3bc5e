// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::time::Duration;

use ra_daemon::protocol::{self, ProtocolError};
use ra_daemon::{Request, Response, StatusOverview, PROTOCOL_VERSION};
use ra_engine::StatusClass;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::cli_log::log_connection_error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon answered with an error class.
    #[error("{status} ({}): {message}", status.code())]
    Rejected {
        status: StatusClass,
        message: String,
    },

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// One request per connection, like the daemon expects.
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Connect to the running daemon. There is no auto-start: agents and
    /// operators both expect a daemon that is already serving.
    pub fn connect() -> Result<Self, ClientError> {
        let socket_path = crate::env::state_dir()?.join("daemon.sock");
        if !socket_path.exists() {
            let err = ClientError::DaemonNotRunning;
            log_connection_error(&err);
            return Err(err);
        }
        Ok(Self::at(socket_path))
    }

    pub fn at(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: crate::env::timeout_ipc(),
        }
    }

    async fn send_with_timeout(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(request)?;
        tokio::time::timeout(self.timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes = tokio::time::timeout(self.timeout, protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a request and return the raw response, error classes included.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        match self.send_with_timeout(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                log_connection_error(&e);
                Err(e)
            }
        }
    }

    /// Like [`send`](Self::send), but error classes become [`ClientError::Rejected`].
    pub async fn call(&self, request: &Request) -> Result<Response, ClientError> {
        match self.send(request).await? {
            Response::Error { status, message } => Err(ClientError::Rejected { status, message }),
            response => Ok(response),
        }
    }

    /// Daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello {
            version: PROTOCOL_VERSION.to_string(),
        };
        match self.call(&request).await? {
            Response::Hello { version } => Ok(version),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn status(&self) -> Result<StatusOverview, ClientError> {
        match self.call(&Request::Status).await? {
            Response::Status { status } => Ok(status),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
