//! CLI output formatting.
//!
//! Renderers return the text so it can be tested; the `print_*` wrappers
//! write it to stdout.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::ExperimentConfig;
use crate::error::{SimError, SimResult};
use crate::replication::{ControllerPhase, ExplorationReport, ReplicationReport};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Version string, with the git hash when the build captured one.
#[must_use]
pub fn version_string() -> String {
    let version = option_env!("SIMREP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    match option_env!("GIT_HASH") {
        Some(hash) => format!("simrep {version} ({hash})"),
        None => format!("simrep {version}"),
    }
}

/// Print version information.
pub fn print_version() {
    println!("{}", version_string());
}

/// Print help message.
pub fn print_help() {
    println!(
        r"simrep - Adaptive replication control for stochastic simulation studies

USAGE:
    simrep <COMMAND> [OPTIONS]

COMMANDS:
    run <experiment.yaml>       Find the replications each metric needs
        --seed <N>              Override the experiment seed
        --json                  Print the report as JSON
        -v, --verbose           Include the statistics history

    explore <experiment.yaml>   Analyse a fixed block of replications
        -n, --replications <N>  Override the block size
        --seed <N>              Override the experiment seed
        --json                  Print the report as JSON

    help                        Show this help message
    version                     Show version information

EXAMPLES:
    simrep run experiments/mm2_staffing.yaml
    simrep run experiments/mm2_staffing.yaml --seed 12345 -v
    simrep explore experiments/mm2_staffing.yaml --replications 100 --json

EXIT STATUS:
    0  every metric reached the desired precision (or exploration finished)
    1  configuration or simulation error
    2  replication budget exhausted before every metric was solved

Logging goes to stderr and is controlled by RUST_LOG (default: info).
"
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

/// Render the controller report.
#[must_use]
pub fn render_replication_report(
    config: &ExperimentConfig,
    report: &ReplicationReport,
    verbose: bool,
) -> String {
    let mut out = String::new();
    let settings = config.replication_settings();

    let _ = writeln!(out, "{RULE}");
    if !config.name.is_empty() {
        let _ = writeln!(out, "Experiment: {}", config.name);
    }
    let _ = writeln!(out, "Seed: {}", config.reproducibility.seed);
    let _ = writeln!(
        out,
        "Precision: ±{:.1}% at {:.0}% confidence, look-ahead {}",
        settings.desired_precision * 100.0,
        settings.confidence_level * 100.0,
        settings.look_ahead
    );
    let _ = writeln!(
        out,
        "Budget: {} replications (initial block {})",
        settings.replication_budget, settings.initial_replications
    );
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "Required Replications:");
    for (metric, count) in &report.solved {
        let sym = if count.reached().is_some() { "✓" } else { "✗" };
        let _ = writeln!(out, "  {sym} {metric:<24} {count}");
    }

    let _ = writeln!(out, "\nFinal Statistics:");
    for (metric, summary) in &report.summaries {
        let _ = writeln!(
            out,
            "  {metric:<24} mean {}  sd {}  CI [{}, {}]  deviation {}",
            fmt_opt(summary.mean),
            fmt_opt(summary.std_dev),
            fmt_opt(summary.ci_lower),
            fmt_opt(summary.ci_upper),
            fmt_opt(summary.deviation)
        );
    }

    if verbose && !report.history.is_empty() {
        let _ = writeln!(out, "\nHistory:");
        let _ = writeln!(
            out,
            "  {:>5}  {:<24} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "rep", "metric", "value", "mean", "ci_lower", "ci_upper", "deviation"
        );
        for row in &report.history {
            let _ = writeln!(
                out,
                "  {:>5}  {:<24} {:>10.4} {:>10.4} {:>10} {:>10} {:>10}",
                row.replication,
                row.metric,
                row.observation,
                row.mean,
                fmt_opt(row.ci_lower),
                fmt_opt(row.ci_upper),
                fmt_opt(row.deviation)
            );
        }
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  ! {warning}");
        }
    }

    let (sym, status) = match report.status {
        ControllerPhase::Solved => ("✓", "SOLVED"),
        _ => ("✗", "BUDGET EXHAUSTED"),
    };
    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(
        out,
        "{sym} Result: {status} after {} replications",
        report.final_replications
    );
    let _ = writeln!(out, "{RULE}");
    out
}

/// Print the controller report.
pub fn print_replication_report(
    config: &ExperimentConfig,
    report: &ReplicationReport,
    verbose: bool,
) {
    println!("{}", render_replication_report(config, report, verbose));
}

/// Render the exploration report.
#[must_use]
pub fn render_exploration_report(config: &ExperimentConfig, report: &ExplorationReport) -> String {
    let mut out = String::new();
    let estimator = config.batch_estimator();

    let _ = writeln!(out, "{RULE}");
    if !config.name.is_empty() {
        let _ = writeln!(out, "Experiment: {}", config.name);
    }
    let _ = writeln!(out, "Seed: {}", config.reproducibility.seed);
    let _ = writeln!(
        out,
        "Block: {} replications, target ±{:.1}% at {:.0}% confidence",
        report.replications,
        estimator.desired_precision() * 100.0,
        estimator.confidence_level() * 100.0
    );
    let _ = writeln!(out, "{RULE}\n");

    for estimate in report.estimates.values() {
        let sym = if estimate.required.is_some() { "✓" } else { "✗" };
        let required = estimate
            .required
            .map_or_else(|| "not reached".to_string(), |n| n.to_string());
        let _ = writeln!(out, "{sym} {}: {required}", estimate.metric);
        let _ = writeln!(
            out,
            "  {:>5} {:>10} {:>10} {:>10} {:>10}",
            "rep", "mean", "ci_lower", "ci_upper", "%dev"
        );
        for row in &estimate.rows {
            let marker = if Some(row.replications) == estimate.required {
                " <"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {:>5} {:>10.4} {:>10} {:>10} {:>10}{marker}",
                row.replications,
                row.mean,
                fmt_opt(row.ci_lower),
                fmt_opt(row.ci_upper),
                fmt_opt(row.perc_deviation)
            );
        }
        if let Some(warning) = &estimate.warning {
            let _ = writeln!(out, "  ! {warning}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{RULE}");
    out
}

/// Print the exploration report.
pub fn print_exploration_report(config: &ExperimentConfig, report: &ExplorationReport) {
    println!("{}", render_exploration_report(config, report));
}

/// Render any report as pretty JSON.
///
/// # Errors
///
/// Returns a serialization error if the value cannot be encoded.
pub fn render_json<T: Serialize>(value: &T) -> SimResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SimError::serialization(e.to_string()))
}
