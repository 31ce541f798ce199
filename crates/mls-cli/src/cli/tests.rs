//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_simulate_defaults() {
    match parse(&["mls", "simulate", "scenario.toml"]) {
        CliCommand::Simulate {
            path,
            settle_ms,
            json,
        } => {
            assert_eq!(path, "scenario.toml");
            assert_eq!(settle_ms, 5000);
            assert!(!json);
        }
        _ => panic!("expected Simulate"),
    }
}

#[test]
fn cli_parse_simulate_flags() {
    match parse(&[
        "mls",
        "simulate",
        "demos/landing.toml",
        "--settle-ms",
        "250",
        "--json",
    ]) {
        CliCommand::Simulate {
            path,
            settle_ms,
            json,
        } => {
            assert_eq!(path, "demos/landing.toml");
            assert_eq!(settle_ms, 250);
            assert!(json);
        }
        _ => panic!("expected Simulate with flags"),
    }
}

#[test]
fn cli_parse_config() {
    match parse(&["mls", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["mls", "completions", "bash"]) {
        CliCommand::Completions { shell } => {
            assert_eq!(shell, clap_complete::Shell::Bash);
        }
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_man() {
    match parse(&["mls", "man"]) {
        CliCommand::Man => {}
        _ => panic!("expected Man"),
    }
}

#[test]
fn cli_rejects_missing_scenario_path() {
    assert!(Cli::try_parse_from(["mls", "simulate"]).is_err());
}
