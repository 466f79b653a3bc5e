// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ra_core::test_support::{job_enqueued_event, job_released_event};
use std::io::Write as _;
use tempfile::tempdir;

#[test]
fn append_assigns_increasing_seq() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("wal.jsonl"), 0).unwrap();
    assert_eq!(wal.append(&job_enqueued_event("j1", 1)).unwrap(), 1);
    assert_eq!(wal.append(&job_enqueued_event("j2", 2)).unwrap(), 2);
    assert_eq!(wal.write_seq(), 2);
}

#[test]
fn entries_are_durable_only_after_flush() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&job_enqueued_event("j1", 1)).unwrap();
    assert!(wal.entries_after(0).unwrap().is_empty());

    wal.flush().unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[0].event, job_enqueued_event("j1", 1));
}

#[test]
fn reopen_continues_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&job_enqueued_event("j1", 1)).unwrap();
        wal.append(&job_enqueued_event("j2", 2)).unwrap();
        wal.flush().unwrap();
    }
    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert_eq!(wal.append(&job_enqueued_event("j3", 3)).unwrap(), 3);
}

#[test]
fn reopen_numbers_after_snapshot_seq() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("wal.jsonl"), 40).unwrap();
    assert_eq!(wal.append(&job_enqueued_event("j1", 1)).unwrap(), 41);
}

#[test]
fn entries_after_filters_by_seq() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("wal.jsonl"), 0).unwrap();
    for i in 1..=5 {
        wal.append(&job_enqueued_event(&format!("j{i}"), i)).unwrap();
    }
    wal.flush().unwrap();
    let seqs: Vec<u64> = wal.entries_after(3).unwrap().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![4, 5]);
}

#[test]
fn truncate_before_keeps_later_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();
    for i in 1..=4 {
        wal.append(&job_enqueued_event(&format!("j{i}"), i)).unwrap();
    }
    wal.truncate_before(3).unwrap();

    let seqs: Vec<u64> = wal.entries_after(0).unwrap().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![3, 4]);

    // Appends after truncation land in the new file
    wal.append(&job_released_event("j3", "tok-new")).unwrap();
    wal.flush().unwrap();
    assert_eq!(wal.entries_after(4).unwrap().len(), 1);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn corrupt_tail_is_rotated_and_valid_prefix_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&job_enqueued_event("j1", 1)).unwrap();
        wal.append(&job_enqueued_event("j2", 2)).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":3,\"event\":{\"type\":\"job:enq").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    assert_eq!(wal.entries_after(0).unwrap().len(), 2);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn unknown_event_types_replay_as_custom() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    std::fs::write(&path, "{\"seq\":1,\"event\":{\"type\":\"future:thing\"}}\n").unwrap();

    let wal = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries[0].event, Event::Custom);
}

#[test]
fn needs_flush_when_buffer_full() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("wal.jsonl"), 0).unwrap();
    assert!(!wal.needs_flush());
    for i in 0..FLUSH_THRESHOLD as u64 {
        wal.append(&job_enqueued_event("j", i)).unwrap();
    }
    assert!(wal.needs_flush());
    wal.flush().unwrap();
    assert!(!wal.needs_flush());
}

#[test]
fn failed_flush_keeps_records_buffered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&job_enqueued_event("j1", 1)).unwrap();
    wal.flush().unwrap();

    wal.append(&job_enqueued_event("j2", 2)).unwrap();
    wal.append(&job_enqueued_event("j3", 3)).unwrap();
    wal.make_unwritable().unwrap();
    assert!(wal.flush().is_err());
    assert_eq!(wal.buffered(), 2);

    wal.make_writable().unwrap();
    wal.flush().unwrap();
    assert_eq!(wal.buffered(), 0);
    let seqs: Vec<_> = wal.entries_after(0).unwrap().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[test]
fn discard_last_only_takes_back_the_newest_unflushed_record() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("wal.jsonl"), 0).unwrap();
    wal.append(&job_enqueued_event("j1", 1)).unwrap();
    wal.flush().unwrap();
    assert!(!wal.discard_last(1));

    wal.append(&job_enqueued_event("j2", 2)).unwrap();
    let seq = wal.append(&job_enqueued_event("j3", 3)).unwrap();
    assert!(!wal.discard_last(seq - 1));
    assert!(wal.discard_last(seq));
    assert_eq!(wal.write_seq(), 2);
    assert_eq!(wal.buffered(), 1);
}
