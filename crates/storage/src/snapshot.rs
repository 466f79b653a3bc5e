// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time copy of the materialized state.
//!
//! A snapshot records the WAL sequence it covers. Recovery loads it and
//! replays only the WAL entries after that sequence.

use crate::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Highest WAL sequence folded into `state`
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState) -> Self {
        Self {
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Write to `<path>.tmp`, fsync, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load the snapshot at `path`, with derived indexes rebuilt.
    ///
    /// A missing file is `Ok(None)`. So is a corrupt one, after it has been
    /// moved aside to `.bak` so the state can be rebuilt from the WAL.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(path)?);
        match serde_json::from_reader::<_, Snapshot>(reader) {
            Ok(mut snapshot) => {
                snapshot.state.rebuild_indexes();
                Ok(Some(snapshot))
            }
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "corrupt snapshot, moving to .bak and replaying WAL from the start",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Next free backup path: `.bak`, then `.bak.2`, `.bak.3`.
///
/// Existing backups shift up by one and the oldest beyond
/// [`MAX_BAK_FILES`] is deleted.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| match n {
        1 => path.with_extension("bak"),
        n => path.with_extension(format!("bak.{n}")),
    };

    let _ = fs::remove_file(bak(MAX_BAK_FILES));
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
