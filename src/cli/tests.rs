//! CLI module tests.

use super::args::{Args, Command};
use super::commands::{execute_explore, execute_run, load_experiment, run_cli};
use super::output::{render_exploration_report, render_json, render_replication_report, version_string};
use crate::config::ExperimentConfig;
use crate::error::SimError;
use crate::replication::{ControllerPhase, ReplicationCount};
use std::path::PathBuf;
use std::process::ExitCode;

const SMALL_EXPERIMENT: &str = r"
name: cli-test
reproducibility:
  seed: 11
model:
  arrival_rate: 0.5
  service_rate: 1.0
  warm_up: 20.0
  run_length: 200.0
replications:
  metrics: [mean_utilisation]
  desired_precision: 0.2
  initial_replications: 3
  look_ahead: 2
  replication_budget: 60
  workers: 2
exploration:
  replications: 8
";

/// Write a uniquely named experiment file under the temp dir.
fn experiment_file(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "simrep-cli-{tag}-{}.yaml",
        std::process::id()
    ));
    std::fs::write(&path, contents).expect("write temp experiment");
    path
}

// ============================================================================
// Args parsing tests
// ============================================================================

#[test]
fn test_parse_no_args_shows_help() {
    let args = Args::parse_from(["simrep"]);
    assert_eq!(args.command, Command::Help);
}

#[test]
fn test_parse_help_variants() {
    for flag in ["-h", "--help", "help"] {
        assert_eq!(Args::parse_from(["simrep", flag]).command, Command::Help);
    }
}

#[test]
fn test_parse_version_variants() {
    for flag in ["-V", "--version", "version"] {
        assert_eq!(Args::parse_from(["simrep", flag]).command, Command::Version);
    }
}

#[test]
fn test_parse_unknown_command_shows_help() {
    let args = Args::parse_from(["simrep", "frobnicate"]);
    assert_eq!(args.command, Command::Help);
}

#[test]
fn test_parse_run_minimal() {
    let args = Args::parse_from(["simrep", "run", "exp.yaml"]);
    assert_eq!(
        args.command,
        Command::Run {
            experiment_path: PathBuf::from("exp.yaml"),
            seed_override: None,
            json: false,
            verbose: false,
        }
    );
}

#[test]
fn test_parse_run_all_flags() {
    let args = Args::parse_from(["simrep", "run", "exp.yaml", "--seed", "99", "--json", "-v"]);
    assert_eq!(
        args.command,
        Command::Run {
            experiment_path: PathBuf::from("exp.yaml"),
            seed_override: Some(99),
            json: true,
            verbose: true,
        }
    );
    assert!(args.command.wants_json());
}

#[test]
fn test_parse_run_bad_seed_ignored() {
    let args = Args::parse_from(["simrep", "run", "exp.yaml", "--seed", "abc", "--verbose"]);
    assert!(matches!(
        args.command,
        Command::Run {
            seed_override: None,
            verbose: true,
            ..
        }
    ));
}

#[test]
fn test_parse_run_missing_seed_value() {
    let args = Args::parse_from(["simrep", "run", "exp.yaml", "--seed"]);
    assert!(matches!(args.command, Command::Run { seed_override: None, .. }));
}

#[test]
fn test_parse_run_missing_path() {
    let args = Args::parse_from(["simrep", "run"]);
    assert_eq!(args.command, Command::Help);
}

#[test]
fn test_parse_explore() {
    let args = Args::parse_from([
        "simrep",
        "explore",
        "exp.yaml",
        "--replications",
        "120",
        "--seed",
        "5",
    ]);
    assert_eq!(
        args.command,
        Command::Explore {
            experiment_path: PathBuf::from("exp.yaml"),
            replications: Some(120),
            seed_override: Some(5),
            json: false,
        }
    );
    assert!(!args.command.wants_json());
}

#[test]
fn test_parse_explore_short_flag_and_json() {
    let args = Args::parse_from(["simrep", "explore", "exp.yaml", "-n", "30", "--json"]);
    assert!(matches!(
        args.command,
        Command::Explore {
            replications: Some(30),
            json: true,
            ..
        }
    ));
}

#[test]
fn test_parse_explore_missing_path() {
    let args = Args::parse_from(["simrep", "explore"]);
    assert_eq!(args.command, Command::Help);
}

// ============================================================================
// Command tests
// ============================================================================

#[test]
fn test_run_cli_help_and_version() {
    assert_eq!(run_cli(Args { command: Command::Help }), ExitCode::SUCCESS);
    assert_eq!(run_cli(Args { command: Command::Version }), ExitCode::SUCCESS);
}

#[test]
fn test_run_cli_missing_file_fails() {
    let code = run_cli(Args::parse_from(["simrep", "run", "/nonexistent/exp.yaml"]));
    assert_eq!(code, ExitCode::from(1));
    let code = run_cli(Args::parse_from(["simrep", "explore", "/nonexistent/exp.yaml"]));
    assert_eq!(code, ExitCode::from(1));
}

#[test]
fn test_load_experiment_seed_override() {
    let path = experiment_file("seed", SMALL_EXPERIMENT);
    let config = load_experiment(&path, Some(1234)).expect("valid experiment");
    assert_eq!(config.reproducibility.seed, 1234);
    assert_eq!(config.queue_params().seed, 1234);
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_load_experiment_invalid_yaml() {
    let path = experiment_file("invalid", "replications:\n  desired_precision: -1.0\n");
    let err = load_experiment(&path, None);
    assert!(matches!(err, Err(SimError::Config { .. })));
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_execute_run_is_reproducible() {
    let config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    let first = execute_run(&config).expect("run");
    let second = execute_run(&config).expect("run");
    assert_eq!(first, second);
    assert!(first.final_replications >= 3);
    assert!(first.final_replications <= 60);
    assert!(first.required("mean_utilisation").is_some());
}

#[test]
fn test_execute_run_budget_exhausted() {
    let mut config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    config.replications.desired_precision = 1e-6;
    config.replications.replication_budget = 4;
    let report = execute_run(&config).expect("run");
    assert_eq!(report.status, ControllerPhase::BudgetExhausted);
    assert_eq!(report.final_replications, 4);
    assert_eq!(
        report.required("mean_utilisation"),
        Some(ReplicationCount::NotReached)
    );
}

#[test]
fn test_execute_explore_block_size_override() {
    let config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    let report = execute_explore(&config, Some(12)).expect("explore");
    assert_eq!(report.replications, 12);
    assert_eq!(report.raw["mean_utilisation"].len(), 12);
    assert!(report.estimates.contains_key("mean_utilisation_x100"));

    let default_block = execute_explore(&config, None).expect("explore");
    assert_eq!(default_block.replications, 8);
}

#[test]
fn test_run_command_end_to_end() {
    let path = experiment_file("run", SMALL_EXPERIMENT);
    let code = run_cli(Args::parse_from([
        "simrep",
        "run",
        path.to_str().unwrap_or_default(),
        "--json",
    ]));
    assert_ne!(code, ExitCode::from(1));
    let code = run_cli(Args::parse_from([
        "simrep",
        "explore",
        path.to_str().unwrap_or_default(),
    ]));
    assert_eq!(code, ExitCode::SUCCESS);
    let _ = std::fs::remove_file(path);
}

// ============================================================================
// Output tests
// ============================================================================

#[test]
fn test_version_string() {
    let version = version_string();
    assert!(version.starts_with("simrep "));
    assert!(version.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_render_replication_report() {
    let config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    let report = execute_run(&config).expect("run");

    let text = render_replication_report(&config, &report, false);
    assert!(text.contains("Experiment: cli-test"));
    assert!(text.contains("Seed: 11"));
    assert!(text.contains("mean_utilisation"));
    assert!(text.contains("Result:"));
    assert!(!text.contains("History:"));

    let verbose = render_replication_report(&config, &report, true);
    assert!(verbose.contains("History:"));
}

#[test]
fn test_render_budget_exhausted_shows_warning() {
    let mut config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    config.replications.desired_precision = 1e-6;
    config.replications.replication_budget = 3;
    let report = execute_run(&config).expect("run");
    let text = render_replication_report(&config, &report, false);
    assert!(text.contains("not reached"));
    assert!(text.contains("BUDGET EXHAUSTED"));
    assert!(text.contains("Warnings:"));
}

#[test]
fn test_render_exploration_report() {
    let config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    let report = execute_explore(&config, None).expect("explore");
    let text = render_exploration_report(&config, &report);
    assert!(text.contains("Block: 8 replications"));
    assert!(text.contains("mean_utilisation_x100"));
}

#[test]
fn test_render_json_report() {
    let config = ExperimentConfig::from_yaml(SMALL_EXPERIMENT).expect("valid");
    let report = execute_run(&config).expect("run");
    let json = render_json(&report).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert!(value.get("status").is_some());
    assert!(value.get("history").and_then(|h| h.as_array()).is_some());
    assert_eq!(
        value.get("final_replications").and_then(serde_json::Value::as_u64),
        Some(report.final_replications as u64)
    );
}
