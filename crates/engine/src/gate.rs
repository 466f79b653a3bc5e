// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime toggle for the two-phase acknowledgment handshake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared on/off switch. Clones observe the same value.
///
/// Only consulted when a job is claimed; flipping it never affects a
/// handshake already in flight.
#[derive(Clone, Debug, Default)]
pub struct AckGate {
    enabled: Arc<AtomicBool>,
}

impl AckGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }
}
