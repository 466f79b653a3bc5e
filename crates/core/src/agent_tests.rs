// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn agent() -> AgentRecord {
    AgentRecord::new(
        AgentConfig {
            id: "agent-1".to_string(),
            name: "builder".to_string(),
            credential: "ra_secret".to_string(),
            ..Default::default()
        },
        500,
    )
}

#[test]
fn credential_digest_is_sha256_hex() {
    assert_eq!(
        credential_digest("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn new_agent_stores_digest_not_credential() {
    let agent = agent();
    assert_ne!(agent.credential_digest, "ra_secret");
    assert!(agent.active);
    assert_eq!(agent.registered_at_ms, 500);
}

#[yare::parameterized(
    correct = { "ra_secret", true },
    wrong = { "ra_other", false },
    empty = { "", false },
)]
fn credential_matches(credential: &str, expected: bool) {
    assert_eq!(agent().credential_matches(credential), expected);
}

#[test]
fn touch_records_agent_and_instance_contact() {
    let mut agent = agent();
    let host = WorkerInstanceId::new("host-a");
    agent.touch(Some(&host), 1_000);
    assert_eq!(agent.contacted_at_ms, Some(1_000));
    assert!(agent.has_instance(&host));

    agent.touch(None, 2_000);
    assert_eq!(agent.contacted_at_ms, Some(2_000));
    assert_eq!(agent.instances[&host].contacted_at_ms, 1_000);
}

#[test]
fn touch_never_moves_contact_backwards() {
    let mut agent = agent();
    let host = WorkerInstanceId::new("host-a");
    agent.touch(Some(&host), 3_000);
    agent.touch(Some(&host), 1_000);
    assert_eq!(agent.contacted_at_ms, Some(3_000));
    assert_eq!(agent.instances[&host].contacted_at_ms, 3_000);
}

#[test]
fn access_level_serializes_snake_case() {
    let json = serde_json::to_string(&AccessLevel::RefProtected).unwrap();
    assert_eq!(json, "\"ref_protected\"");
    assert_eq!(AccessLevel::default(), AccessLevel::NotProtected);
}
