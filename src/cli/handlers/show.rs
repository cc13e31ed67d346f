// src/cli/handlers/show.rs

use crate::{CancellationToken, cli::handlers::commons, core::persistence};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Displays a stored project as a tree.")]
struct ShowArgs {
    /// The stored project file (`<buildDirectory>/<id>.bg`).
    file: PathBuf,

    /// List groups and files below each product.
    #[arg(long, short)]
    files: bool,
}

pub fn handle(args: Vec<String>, _cancellation_token: &CancellationToken) -> Result<()> {
    let args = ShowArgs::try_parse_from(&args)?;
    let top = persistence::load(&args.file)
        .with_context(|| format!("Cannot show '{}'", args.file.display()))?;

    println!(
        "{} {} ({} product(s))",
        "Configuration".blue(),
        top.id.yellow(),
        top.products.len()
    );
    commons::print_project(&top, args.files);
    Ok(())
}
