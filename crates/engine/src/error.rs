// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the assignment coordinator

use crate::StatusClass;
use ra_core::JobId;
use ra_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by protocol and operator calls
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Unknown or empty agent credential.
    #[error("agent authentication failed")]
    AuthenticationFailed,
    /// Token mismatch, unknown job, or the call is out of protocol order.
    #[error("job is not processing on this agent")]
    NotProcessingOnAgent,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    pub fn status(&self) -> StatusClass {
        match self {
            CoordinatorError::AuthenticationFailed | CoordinatorError::NotProcessingOnAgent => {
                StatusClass::Forbidden
            }
            CoordinatorError::Conflict(_) => StatusClass::Conflict,
            CoordinatorError::BadRequest(_) | CoordinatorError::JobNotFound(_) => {
                StatusClass::BadRequest
            }
            CoordinatorError::Store(_) => StatusClass::Internal,
        }
    }
}
