//! `aion-gpi`: inspect a model design through the GPI adapter.
//!
//! Provides `aion-gpi tree` for printing the object hierarchy the adapter
//! discovers, and `aion-gpi probe` for resolving one dotted path and reading
//! (or depositing) its value.

#![warn(missing_docs)]

mod probe;
mod session;
mod tree;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Aion GPI: walk and probe designs through the procedural interface.
#[derive(Parser, Debug)]
#[command(name = "aion-gpi", version, about = "Aion GPI adapter tool")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a GPI configuration TOML file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the object hierarchy of a design.
    Tree(TreeArgs),
    /// Resolve one object and print its properties.
    Probe(ProbeArgs),
}

/// Arguments for the `aion-gpi tree` subcommand.
#[derive(Parser, Debug)]
pub struct TreeArgs {
    /// Design description (TOML).
    pub design: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Maximum depth below the top scope.
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Also list package scopes.
    #[arg(long)]
    pub packages: bool,
}

/// Arguments for the `aion-gpi probe` subcommand.
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Design description (TOML).
    pub design: String,

    /// Dotted path of the object, e.g. `top.lane(2).data`.
    pub path: String,

    /// Deposit this value before reading.
    #[arg(long)]
    pub set: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to log at debug level.
    pub verbose: bool,
    /// Optional path to a GPI configuration file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Tree(ref args) => tree::run(args, &global),
        Command::Probe(ref args) => probe::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
