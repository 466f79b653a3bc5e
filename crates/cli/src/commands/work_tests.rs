// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;
use serial_test::serial;

#[derive(Parser)]
struct RequestCli {
    #[command(flatten)]
    args: RequestArgs,
}

fn request_args(args: &[&str]) -> RequestArgs {
    RequestCli::try_parse_from(std::iter::once("request").chain(args.iter().copied()))
        .unwrap()
        .args
}

#[test]
fn two_phase_flag_advertises_feature() {
    let args = request_args(&["--instance", "host-a", "--two-phase", "--feature", "cache"]);
    let features = features(&args);
    assert!(features.supports_two_phase());
    assert!(features.supports("cache"));
    assert!(!features.supports("gpu"));
}

#[test]
fn no_flags_advertise_nothing() {
    let args = request_args(&["--instance", "host-a"]);
    assert!(!features(&args).supports_two_phase());
}

#[test]
fn instance_is_required() {
    assert!(RequestCli::try_parse_from(["request"]).is_err());
}

#[test]
#[serial]
fn credential_falls_back_to_env() {
    std::env::set_var("RA_AGENT_CREDENTIAL", "from-env");
    assert_eq!(credential(None).unwrap(), "from-env");
    assert_eq!(credential(Some("flag".to_string())).unwrap(), "flag");
    std::env::remove_var("RA_AGENT_CREDENTIAL");
    assert!(credential(None).is_err());
}

#[yare::parameterized(
    started = { AckOutcome::Started, "Job job-1 acknowledged, now running" },
    already = { AckOutcome::AlreadyRunning, "Job job-1 already running" },
)]
fn ack_messages(outcome: AckOutcome, expected: &str) {
    assert_eq!(ack_message("job-1", outcome), expected);
}
