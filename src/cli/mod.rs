// src/cli/mod.rs

use clap::Parser;

pub mod handlers;

/// projgraph: resolves loaded build descriptions into a project model.
///
/// Usage:
/// - `projgraph resolve <description.json> [options]`
/// - `projgraph show <file.bg> [--files]`
///
/// Each command parses its own options; run `projgraph <command> --help`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The command to run.
    pub command: Option<String>,

    /// Arguments passed on to the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
