//! simrep CLI - adaptive replication control
//!
//! Command-line interface for replication analysis of the reference
//! queueing model.

use std::process::ExitCode;

use simrep::cli::{run_cli, Args};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();

    // JSON goes to stdout; keep stderr quiet unless asked
    let default_level = if args.command.wants_json() {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    run_cli(args)
}
