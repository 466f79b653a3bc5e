// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event write-ahead log with group commit support.
//!
//! Every state change is appended here before it becomes visible, so the
//! store can be rebuilt from the last snapshot plus the entries after it.
//! Group commit batches fsyncs (~10ms or 100 entries).
//!
//! Each entry is a single line of JSON: `{"seq":N,"event":{...}}\n`

use ra_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    event: Event,
}

/// A single WAL entry with sequence number
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Result of reading a WAL file front to back.
struct Scan {
    /// Parsed records with their raw line, up to the first bad line.
    records: Vec<(WalRecord, String)>,
    /// A line failed to parse before EOF.
    corrupt: bool,
}

/// JSONL WAL with buffered appends.
///
/// Appended events are durable only after `flush()`. Callers either flush
/// right away or poll `needs_flush()` from a timer to get group commit.
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Highest sequence number assigned
    write_seq: u64,
    /// Serialized records waiting for the next flush
    write_buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// `snapshot_seq` is the sequence covered by the latest snapshot (or 0);
    /// new entries are numbered after it even if the file was truncated empty.
    /// A file whose tail does not parse is rotated to `.bak` and rewritten
    /// with only the entries before the corruption point.
    pub fn open(path: &Path, snapshot_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = Self::open_append(path)?;
        let scan = Self::scan(&file)?;

        if scan.corrupt {
            drop(file);
            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = scan.records.len(),
                "corrupt WAL detected, rotating to .bak and keeping valid entries",
            );
            std::fs::rename(path, &bak_path)?;
            Self::write_lines(path, scan.records.iter().map(|(_, line)| line.as_str()))?;
            file = Self::open_append(path)?;
        }

        let write_seq = scan
            .records
            .iter()
            .map(|(record, _)| record.seq)
            .max()
            .unwrap_or(0)
            .max(snapshot_seq);

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
            write_buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
    }

    fn scan(file: &File) -> Result<Scan, WalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut records = Vec::new();
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(trimmed) {
                Ok(record) => records.push((record, trimmed.to_string())),
                Err(e) => {
                    warn!(error = %e, "unparseable WAL line, stopping scan");
                    corrupt = true;
                    break;
                }
            }
        }

        Ok(Scan { records, corrupt })
    }

    /// Write `lines` to a fresh file at `path` and fsync it.
    fn write_lines<'a>(path: &Path, lines: impl Iterator<Item = &'a str>) -> io::Result<()> {
        let mut file = File::create(path)?;
        for line in lines {
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.sync_all()
    }

    /// Buffer an event and return its sequence number.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let json_bytes = serde_json::to_vec(&WalRecordRef { seq, event })?;
        self.write_seq = seq;
        self.write_buffer.push(json_bytes);
        Ok(seq)
    }

    /// Interval elapsed or buffer full, with something to write.
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Write all buffered entries with a single fsync.
    ///
    /// On failure the buffer is left intact and any partial write is cut off
    /// the file, so a later flush writes every record exactly once.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        let start_len = self.file.metadata()?.len();
        if let Err(e) = self.write_buffered() {
            if let Err(trunc) = self.file.set_len(start_len) {
                warn!(error = %trunc, "could not cut partial WAL write");
            }
            return Err(e.into());
        }

        self.write_buffer.clear();
        self.last_flush = Instant::now();
        Ok(())
    }

    fn write_buffered(&mut self) -> io::Result<()> {
        for json_bytes in &self.write_buffer {
            self.file.write_all(json_bytes)?;
            self.file.write_all(b"\n")?;
        }
        self.file.sync_all()
    }

    /// Take back the most recent append if it is still unflushed.
    ///
    /// Used when a synchronous commit could not be made durable and its
    /// event will not be applied.
    pub fn discard_last(&mut self, seq: u64) -> bool {
        if seq != self.write_seq || self.write_buffer.is_empty() {
            return false;
        }
        self.write_buffer.pop();
        self.write_seq -= 1;
        true
    }

    /// Records appended but not yet flushed.
    pub fn buffered(&self) -> usize {
        self.write_buffer.len()
    }

    /// Swap the append handle for a read-only one so writes fail.
    #[cfg(test)]
    pub(crate) fn make_unwritable(&mut self) -> io::Result<()> {
        self.file = File::open(&self.path)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn make_writable(&mut self) -> io::Result<()> {
        self.file = Self::open_append(&self.path)?;
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Flushed entries with `seq > after`, in file order.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let scan = Self::scan(&self.file)?;
        Ok(scan
            .records
            .into_iter()
            .filter(|(record, _)| record.seq > after)
            .map(|(record, _)| WalEntry {
                seq: record.seq,
                event: record.event,
            })
            .collect())
    }

    /// Drop entries with `seq < keep_from`, called after a snapshot covers them.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        self.flush()?;

        let scan = Self::scan(&self.file)?;
        let tmp_path = self.path.with_extension("tmp");
        Self::write_lines(
            &tmp_path,
            scan.records
                .iter()
                .filter(|(record, _)| record.seq >= keep_from)
                .map(|(_, line)| line.as_str()),
        )?;
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = Self::open_append(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
