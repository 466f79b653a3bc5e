// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator tests

mod acknowledge;
mod cancel;
mod heartbeat;
mod report;
mod request_work;
mod scenarios;
mod update_state;

use super::*;
use crate::test_helpers::*;
use ra_adapters::LivenessCall;
use ra_core::AckWaitStatus;
