//! CLI argument parsing.
//!
//! This module provides the argument parser for the simrep CLI.
//! Extracted to enable comprehensive testing of argument parsing logic.

use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// The command to execute.
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the adaptive replication controller
    Run {
        /// Path to the experiment YAML file.
        experiment_path: PathBuf,
        /// Optional seed override.
        seed_override: Option<u64>,
        /// Emit the report as JSON.
        json: bool,
        /// Enable verbose output.
        verbose: bool,
    },
    /// Run a fixed block and estimate precision per prefix
    Explore {
        /// Path to the experiment YAML file.
        experiment_path: PathBuf,
        /// Optional block size override.
        replications: Option<usize>,
        /// Optional seed override.
        seed_override: Option<u64>,
        /// Emit the report as JSON.
        json: bool,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

impl Command {
    /// Whether the command writes JSON to stdout.
    #[must_use]
    pub const fn wants_json(&self) -> bool {
        matches!(
            self,
            Self::Run { json: true, .. } | Self::Explore { json: true, .. }
        )
    }
}

/// Options shared by the experiment commands.
#[derive(Debug, Default)]
struct Flags {
    seed: Option<u64>,
    replications: Option<usize>,
    json: bool,
    verbose: bool,
}

impl Args {
    /// Parse command-line arguments from an iterator.
    ///
    /// This method is testable as it accepts any iterator of strings,
    /// not just `std::env::args()`.
    #[must_use]
    pub fn parse_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::parse_from_vec(&args)
    }

    /// Parse command-line arguments from the environment.
    #[must_use]
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    /// Internal parsing from a vector of strings.
    fn parse_from_vec(args: &[String]) -> Self {
        if args.len() < 2 {
            return Self {
                command: Command::Help,
            };
        }

        let command = match args[1].as_str() {
            "run" => Self::parse_run_command(args),
            "explore" => Self::parse_explore_command(args),
            "-h" | "--help" | "help" => Command::Help,
            "-V" | "--version" | "version" => Command::Version,
            unknown => {
                eprintln!("Unknown command: {unknown}");
                Command::Help
            }
        };

        Self { command }
    }

    /// Parse the 'run' command arguments.
    fn parse_run_command(args: &[String]) -> Command {
        if args.len() < 3 {
            eprintln!("Error: 'run' command requires experiment path");
            return Command::Help;
        }

        let flags = Self::parse_flags(&args[3..]);
        Command::Run {
            experiment_path: PathBuf::from(&args[2]),
            seed_override: flags.seed,
            json: flags.json,
            verbose: flags.verbose,
        }
    }

    /// Parse the 'explore' command arguments.
    fn parse_explore_command(args: &[String]) -> Command {
        if args.len() < 3 {
            eprintln!("Error: 'explore' command requires experiment path");
            return Command::Help;
        }

        let flags = Self::parse_flags(&args[3..]);
        Command::Explore {
            experiment_path: PathBuf::from(&args[2]),
            replications: flags.replications,
            seed_override: flags.seed,
            json: flags.json,
        }
    }

    /// Parse trailing options; unparseable values are ignored.
    fn parse_flags(rest: &[String]) -> Flags {
        let mut flags = Flags::default();

        let mut i = 0;
        while i < rest.len() {
            match rest[i].as_str() {
                "--seed" => {
                    if let Some(seed) = rest.get(i + 1).and_then(|s| s.parse().ok()) {
                        flags.seed = Some(seed);
                    }
                    i += 2;
                }
                "--replications" | "-n" => {
                    if let Some(n) = rest.get(i + 1).and_then(|s| s.parse().ok()) {
                        flags.replications = Some(n);
                    }
                    i += 2;
                }
                "--json" => {
                    flags.json = true;
                    i += 1;
                }
                "-v" | "--verbose" => {
                    flags.verbose = true;
                    i += 1;
                }
                other => {
                    eprintln!("Warning: ignoring unknown option '{other}'");
                    i += 1;
                }
            }
        }

        flags
    }
}
