// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::test_helpers::*;
use super::*;

use ra_storage::AgentRegistry;
use tokio::net::UnixStream;

use crate::protocol::{decode, encode, read_message, write_message, Query};

/// Start a listener on a temp socket and return its path.
fn spawn_listener(dir: &std::path::Path, ctx: ListenCtx) -> std::path::PathBuf {
    let path = dir.join("test.sock");
    let socket = UnixListener::bind(&path).unwrap();
    tokio::spawn(Listener::new(socket, ctx).run());
    path
}

async fn roundtrip(path: &std::path::Path, request: &Request) -> Response {
    let mut stream = UnixStream::connect(path).await.unwrap();
    write_message(&mut stream, &encode(request).unwrap())
        .await
        .unwrap();
    decode(&read_message(&mut stream).await.unwrap()).unwrap()
}

#[tokio::test]
async fn serves_one_request_per_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = spawn_listener(dir.path(), test_ctx());

    assert_eq!(roundtrip(&path, &Request::Ping).await, Response::Pong);
    assert_eq!(
        roundtrip(
            &path,
            &Request::Hello {
                version: "0.0.0".to_string()
            }
        )
        .await,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn full_handshake_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = spawn_listener(dir.path(), test_ctx());

    let enqueued = roundtrip(
        &path,
        &Request::EnqueueJob {
            id: Some("job-1".to_string()),
            name: "build".to_string(),
            tags: vec![],
            protected: false,
            required_features: vec![],
        },
    )
    .await;
    assert_eq!(enqueued.status(), StatusClass::Created);

    let Response::Assigned { assignment } = roundtrip(&path, &poll(two_phase())).await else {
        panic!("expected an assignment");
    };
    assert_eq!(
        roundtrip(&path, &signal(&assignment, "pending"))
            .await
            .status(),
        StatusClass::Ok
    );
    assert_eq!(
        roundtrip(&path, &signal(&assignment, "running"))
            .await
            .status(),
        StatusClass::Ok
    );

    let Response::Job { job: Some(job) } = roundtrip(
        &path,
        &Request::Query {
            query: Query::GetJob {
                id: "job-1".to_string(),
            },
        },
    )
    .await
    else {
        panic!("expected the job");
    };
    assert_eq!(job.status, ra_core::JobStatus::Running);
    assert!(job.run.is_some());
}

#[tokio::test]
async fn concurrent_polls_over_the_socket_claim_once() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx();
    for n in 0..8 {
        ctx.services
            .store
            .register_agent(
                ra_core::test_support::agent_config(&format!("racer-{n}"), &format!("rc-{n}")),
                0,
            )
            .unwrap();
    }
    let path = spawn_listener(dir.path(), ctx);
    roundtrip(
        &path,
        &Request::EnqueueJob {
            id: Some("job-1".to_string()),
            name: String::new(),
            tags: vec![],
            protected: false,
            required_features: vec![],
        },
    )
    .await;

    let polls: Vec<_> = (0..8)
        .map(|n| {
            let path = path.clone();
            tokio::spawn(async move {
                roundtrip(
                    &path,
                    &Request::RequestWork {
                        credential: format!("rc-{n}"),
                        worker_instance: format!("host-{n}"),
                        features: two_phase(),
                        job_age_secs: None,
                    },
                )
                .await
            })
        })
        .collect();

    let mut assigned = 0;
    for poll in polls {
        match poll.await.unwrap() {
            Response::Assigned { .. } => assigned += 1,
            Response::NoContent => {}
            other => panic!("unexpected response {other:?}"),
        }
    }
    assert_eq!(assigned, 1);
}

#[tokio::test]
async fn shutdown_request_notifies() {
    let ctx = test_ctx();
    let shutdown = Arc::clone(&ctx.shutdown);
    let notified = shutdown.notified();

    let response = handle_request(Request::Shutdown, &ctx).await;
    assert_eq!(response, Response::ShuttingDown);
    tokio::time::timeout(std::time::Duration::from_secs(1), notified)
        .await
        .unwrap();
}

#[test]
fn request_names_omit_secrets() {
    let request = Request::RequestWork {
        credential: "super-secret".to_string(),
        worker_instance: HOST.to_string(),
        features: Default::default(),
        job_age_secs: None,
    };
    assert_eq!(request_name(&request), "request_work");
}
