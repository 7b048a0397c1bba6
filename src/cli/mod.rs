//! CLI module for simrep.
//!
//! This module contains all CLI logic extracted from main.rs to enable
//! full test coverage. The entry point `run_cli` can be called from main.rs
//! with parsed arguments.

mod args;
mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::{execute_explore, execute_run, load_experiment, run_cli};
pub use output::{
    print_exploration_report, print_help, print_replication_report, print_version,
    render_exploration_report, render_json, render_replication_report, version_string,
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
