// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::liveness::{FakeLiveness, LivenessCall};
use serial_test::{parallel, serial};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

const TTL: Duration = Duration::from_secs(300);

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn assert_log(logs: &str, label: &str, expected: &str) {
    assert!(logs.contains(expected), "Should log {label}. Logs:\n{logs}",);
}

fn job() -> JobId {
    JobId::new("job-42")
}

fn host() -> WorkerInstanceId {
    WorkerInstanceId::new("host-a")
}

#[test]
#[serial(tracing)]
fn put_logs_span_and_completion() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedLiveness::new(FakeLiveness::new());
        traced.put(&job(), &host(), TTL).await
    });

    assert!(result.is_ok());
    assert_log(&logs, "span name", "liveness.put");
    assert_log(&logs, "job id", "job-42");
    assert_log(&logs, "worker instance", "host-a");
    assert_log(&logs, "completion", "entry written");
    assert_log(&logs, "timing", "elapsed_ms");
}

#[test]
#[serial(tracing)]
fn refresh_of_missing_entry_is_logged() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedLiveness::new(FakeLiveness::new());
        traced.refresh(&job(), TTL).await
    });

    assert_eq!(result.unwrap(), Refresh::Missing);
    assert_log(&logs, "refresh span", "liveness.refresh");
    assert_log(&logs, "missing", "entry missing");
}

#[test]
#[serial(tracing)]
fn failures_are_logged_and_returned() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeLiveness::new();
        fake.set_failing(true);
        let traced = TracedLiveness::new(fake);
        let put = traced.put(&job(), &host(), TTL).await;
        let delete = traced.delete(&job()).await;
        (put, delete)
    });

    assert!(result.0.is_err());
    assert!(result.1.is_err());
    assert_log(&logs, "put failure", "put failed");
    assert_log(&logs, "delete failure", "delete failed");
    assert_log(&logs, "error text", "fake failure");
}

#[tokio::test]
#[parallel(tracing)]
async fn delegates_every_call_to_inner() {
    let fake = FakeLiveness::new();
    let traced = TracedLiveness::new(fake.clone());

    traced.put(&job(), &host(), TTL).await.unwrap();
    assert_eq!(traced.refresh(&job(), TTL).await.unwrap(), Refresh::Refreshed);
    assert!(traced.exists(&job()).await.unwrap());
    assert_eq!(traced.worker_instance(&job()).await.unwrap(), Some(host()));
    traced.delete(&job()).await.unwrap();

    assert_eq!(
        fake.calls(),
        vec![
            LivenessCall::Put {
                job: job(),
                worker_instance: host(),
                ttl: TTL
            },
            LivenessCall::Refresh { job: job(), ttl: TTL },
            LivenessCall::Exists { job: job() },
            LivenessCall::WorkerInstance { job: job() },
            LivenessCall::Delete { job: job() },
        ]
    );
    assert!(traced.inner().entry(&job()).is_none());
}
