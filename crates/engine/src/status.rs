// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable result classes of protocol calls.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Created,
    Ok,
    NoContent,
    BadRequest,
    Forbidden,
    Conflict,
    Internal,
}

impl StatusClass {
    /// HTTP-equivalent code, for logs and CLI output.
    pub fn code(&self) -> u16 {
        match self {
            StatusClass::Created => 201,
            StatusClass::Ok => 200,
            StatusClass::NoContent => 204,
            StatusClass::BadRequest => 400,
            StatusClass::Forbidden => 403,
            StatusClass::Conflict => 409,
            StatusClass::Internal => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() < 300
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Created => "created",
            StatusClass::Ok => "ok",
            StatusClass::NoContent => "no_content",
            StatusClass::BadRequest => "bad_request",
            StatusClass::Forbidden => "forbidden",
            StatusClass::Conflict => "conflict",
            StatusClass::Internal => "internal",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.as_str())
    }
}
