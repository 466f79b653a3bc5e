// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn registered_agent_is_active_and_authenticates_by_credential() {
    let mut state = MaterializedState::default();
    state.apply_event(&agent_registered_event("agent-1", "ra_cred"));

    let agent = &state.agents["agent-1"];
    assert!(agent.active);
    assert_eq!(agent.registered_at_ms, TEST_EPOCH_MS);
    assert_eq!(
        state.agent_by_credential("ra_cred").map(|a| a.id.as_str()),
        Some("agent-1")
    );
    assert!(state.agent_by_credential("ra_wrong").is_none());
}

#[test]
fn re_registration_does_not_replace_credential() {
    let mut state = MaterializedState::default();
    state.apply_event(&agent_registered_event("agent-1", "ra_first"));
    state.apply_event(&agent_registered_event("agent-1", "ra_second"));
    assert!(state.agent_by_credential("ra_first").is_some());
    assert!(state.agent_by_credential("ra_second").is_none());
}

#[test]
fn contact_tracks_worker_instances() {
    let mut state = MaterializedState::default();
    state.apply_event(&agent_registered_event("agent-1", "c"));
    state.apply_event(&Event::AgentContacted {
        id: AgentId::new("agent-1"),
        worker_instance_id: Some(WorkerInstanceId::new("host-a")),
        at_ms: 2_000_000,
    });

    let agent = &state.agents["agent-1"];
    assert_eq!(agent.contacted_at_ms, Some(2_000_000));
    assert!(agent.has_instance(&WorkerInstanceId::new("host-a")));
}

#[test]
fn activity_toggles_active_flag() {
    let mut state = MaterializedState::default();
    state.apply_event(&agent_registered_event("agent-1", "c"));
    state.apply_event(&Event::AgentActivity {
        id: AgentId::new("agent-1"),
        active: false,
    });
    assert!(!state.agents["agent-1"].active);

    // Unknown agents are ignored
    state.apply_event(&Event::AgentActivity {
        id: AgentId::new("ghost"),
        active: false,
    });
    assert_eq!(state.agents.len(), 1);
}
