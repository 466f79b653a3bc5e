// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;
use serial_test::serial;

#[derive(Parser)]
struct TestCli {
    #[command(subcommand)]
    command: AgentCommand,
}

fn summary(id: &str, active: bool, tags: &[&str], run_untagged: bool) -> AgentSummary {
    AgentSummary {
        id: id.to_string(),
        name: String::new(),
        active,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        run_untagged,
        access_level: AccessLevel::NotProtected,
        contacted_at_ms: None,
        instances: vec!["host-a".to_string(), "host-b".to_string()],
    }
}

#[test]
fn register_flags_parse() {
    let cli = TestCli::try_parse_from([
        "agent",
        "register",
        "runner-1",
        "--tag",
        "linux",
        "--run-untagged",
        "--protected",
    ])
    .unwrap();
    let AgentCommand::Register {
        id,
        credential,
        tags,
        run_untagged,
        protected,
        ..
    } = cli.command
    else {
        panic!("expected register");
    };
    assert_eq!(id, "runner-1");
    assert_eq!(credential, None);
    assert_eq!(tags, vec!["linux"]);
    assert!(run_untagged);
    assert!(protected);
}

#[test]
fn pause_requires_id() {
    assert!(TestCli::try_parse_from(["agent", "pause"]).is_err());
}

#[test]
#[serial]
fn table_marks_untagged_and_paused() {
    let agents = vec![
        summary("a-1", true, &["linux"], true),
        summary("a-2", false, &[], false),
        summary("a-3", true, &[], true),
    ];
    let mut buf = Vec::new();
    agent_table(&agents).render(&mut buf);
    let out = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = out.lines().collect();

    assert!(lines[1].contains("active") && lines[1].contains("linux,*"));
    assert!(lines[2].contains("paused") && lines[2].contains(" - "));
    assert!(lines[3].contains(" * "));
    assert!(lines[1].ends_with("host-a,host-b"));
}
