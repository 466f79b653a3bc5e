// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn heartbeat_refreshes_without_touching_the_job() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    let before = ctx.job("job-1");
    ctx.liveness.clear_calls();

    ctx.clock.advance(Duration::from_secs(2));
    ctx.coordinator
        .heartbeat(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();

    assert_eq!(ctx.job("job-1"), before);
    assert_eq!(
        ctx.liveness.calls(),
        vec![LivenessCall::Refresh {
            job: assignment.id,
            ttl: ACK_TTL
        }]
    );
}

#[tokio::test]
async fn heartbeat_updates_agent_contact() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    ctx.clock.advance(Duration::from_secs(7));
    ctx.coordinator
        .heartbeat(&assignment.id, &assignment.token, None)
        .await
        .unwrap();

    let agent = ctx.store.agent(&ctx.agent_id()).unwrap();
    assert_eq!(agent.contacted_at_ms, Some(ctx.clock.epoch_ms()));
}

#[tokio::test]
async fn heartbeat_with_wrong_token_is_rejected() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let err = ctx
        .coordinator
        .heartbeat(&assignment.id, "not-the-token", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
}

#[tokio::test]
async fn heartbeat_on_running_job_is_rejected() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .coordinator
        .heartbeat(&assignment.id, &assignment.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
}

#[tokio::test]
async fn heartbeat_on_unclaimed_job_is_rejected() {
    let ctx = setup();
    let job = ctx.enqueue("job-1");

    let err = ctx
        .coordinator
        .heartbeat(&job.id, &job.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
}

#[tokio::test]
async fn heartbeat_on_unknown_job_is_rejected() {
    let ctx = setup();
    let err = ctx
        .coordinator
        .heartbeat(&JobId::new("nope"), "tok", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
}

#[tokio::test]
async fn heartbeat_recreates_missing_entry_from_request_instance() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);

    ctx.coordinator
        .heartbeat(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();

    assert_eq!(ctx.liveness.entry(&assignment.id), Some(host()));
}

#[tokio::test]
async fn heartbeat_without_instance_leaves_missing_entry_alone() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);

    ctx.coordinator
        .heartbeat(&assignment.id, &assignment.token, None)
        .await
        .unwrap();

    assert_eq!(ctx.liveness.entry(&assignment.id), None);
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn heartbeat_survives_liveness_outage() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.set_failing(true);

    ctx.coordinator
        .heartbeat(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn ack_landing_during_refresh_stops_the_repair() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    let hold = ctx.liveness.hold_next_refresh();
    let instance = host();

    let (beat, ack) = tokio::join!(
        ctx.coordinator
            .heartbeat(&assignment.id, &assignment.token, Some(&instance)),
        async {
            let ack = ctx
                .coordinator
                .acknowledge(&assignment.id, &assignment.token, Some(&instance))
                .await;
            hold.notify_one();
            ack
        }
    );

    assert_eq!(ack.unwrap(), AckOutcome::Started);
    assert!(matches!(
        beat.unwrap_err(),
        CoordinatorError::NotProcessingOnAgent
    ));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
    assert_eq!(ctx.liveness.entry(&assignment.id), None);
    assert!(!ctx
        .liveness
        .calls()
        .iter()
        .any(|call| matches!(call, LivenessCall::Put { .. })));
}

#[tokio::test]
async fn ack_landing_during_repair_removes_the_recreated_entry() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    let hold = ctx.liveness.hold_next_put();
    let instance = host();

    let (beat, ack) = tokio::join!(
        ctx.coordinator
            .heartbeat(&assignment.id, &assignment.token, Some(&instance)),
        async {
            let ack = ctx
                .coordinator
                .acknowledge(&assignment.id, &assignment.token, Some(&instance))
                .await;
            hold.notify_one();
            ack
        }
    );

    assert_eq!(ack.unwrap(), AckOutcome::Started);
    assert!(matches!(
        beat.unwrap_err(),
        CoordinatorError::NotProcessingOnAgent
    ));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
    assert_eq!(ctx.liveness.entry(&assignment.id), None);
}

#[tokio::test]
async fn heartbeat_from_unknown_instance_is_rejected_and_not_registered() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    let stranger = WorkerInstanceId::new("host-z");

    let err = ctx
        .coordinator
        .heartbeat(&assignment.id, &assignment.token, Some(&stranger))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert_eq!(ctx.liveness.entry(&assignment.id), None);
    let agent = ctx.store.agent(&ctx.agent_id()).unwrap();
    assert!(!agent.has_instance(&stranger));

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&stranger))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert!(ctx.job("job-1").is_waiting_for_ack());
}
