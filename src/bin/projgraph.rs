// src/bin/projgraph.rs

use anyhow::{Result, bail};
use clap::Parser;
use colored::*;
use projgraph::{
    CancellationToken,
    cli::{Cli, handlers},
    core::project_resolver::ResolverError,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

// --- Command Definition and Registry ---

/// A command, its aliases, and the handler that parses the remaining arguments.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &CancellationToken) -> Result<()>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "resolve",
        aliases: &[],
        handler: handlers::resolve::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &["tree"],
        handler: handlers::show::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn main() {
    let cancellation_token = Arc::new(AtomicBool::new(false));
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse(), &cancellation_token) {
        if let Some(ResolverError::Canceled { .. }) = e.downcast_ref::<ResolverError>() {
            std::process::exit(130);
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli, cancellation_token: &CancellationToken) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(name) = cli.command else {
        let names: Vec<&str> = COMMAND_REGISTRY.iter().map(|c| c.name).collect();
        println!("Usage: projgraph <{}> [args...]", names.join("|"));
        return Ok(());
    };
    match find_command(&name) {
        Some(command) => (command.handler)(cli.args, cancellation_token),
        None => bail!("Unknown command '{}'.", name),
    }
}
