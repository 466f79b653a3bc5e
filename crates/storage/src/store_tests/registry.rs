// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn register_then_authenticate() {
    let store = JobStore::in_memory();
    let agent = registered(&store, "agent-1", "ra_cred");
    assert!(agent.active);
    assert_ne!(agent.credential_digest, "ra_cred");

    let found = store.authenticate("ra_cred").unwrap();
    assert_eq!(found.id, "agent-1");
    assert!(store.authenticate("ra_nope").is_none());
    assert!(store.authenticate("").is_none());
}

#[test]
fn duplicate_registration_is_rejected() {
    let store = JobStore::in_memory();
    registered(&store, "agent-1", "ra_cred");
    let err = store
        .register_agent(agent_config("agent-1", "ra_other"), NOW)
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateAgent(_)));
}

#[test]
fn record_contact_updates_agent_and_instance() {
    let store = JobStore::in_memory();
    registered(&store, "agent-1", "c");
    let host = WorkerInstanceId::new("host-a");
    store
        .record_contact(&AgentId::new("agent-1"), Some(&host), NOW + 10)
        .unwrap();

    let agent = store.agent(&AgentId::new("agent-1")).unwrap();
    assert_eq!(agent.contacted_at_ms, Some(NOW + 10));
    assert_eq!(agent.instances[&host].contacted_at_ms, NOW + 10);
}

#[test]
fn record_contact_for_unknown_agent_fails() {
    let store = JobStore::in_memory();
    let err = store
        .record_contact(&AgentId::new("ghost"), None, NOW)
        .unwrap_err();
    assert!(matches!(err, StoreError::AgentNotFound(_)));
}

#[test]
fn set_agent_active_toggles() {
    let store = JobStore::in_memory();
    registered(&store, "agent-1", "c");
    let paused = store
        .set_agent_active(&AgentId::new("agent-1"), false)
        .unwrap();
    assert!(!paused.active);
    // Paused agents still authenticate
    assert!(store.authenticate("c").is_some());
    assert_eq!(store.agents().len(), 1);
}
