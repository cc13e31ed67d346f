// src/cli/handlers/resolve.rs

use crate::{
    CancellationToken,
    cli::handlers::commons,
    core::{
        evaluator::LiteralEvaluator,
        item_reader, persistence,
        project_resolver::ProjectResolver,
        setup_parameters::{ErrorHandlingMode, SetupProjectParameters},
    },
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Resolves an item-tree description and stores the resolved project."
)]
struct ResolveArgs {
    /// The JSON description of the loaded item tree.
    description: PathBuf,

    /// A TOML file with setup parameters.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides the build root. Defaults to `build` next to the description.
    #[arg(long)]
    build_root: Option<String>,

    /// Disable broken products and rules instead of failing.
    #[arg(long)]
    relaxed: bool,

    /// Where to store the resolved project. Defaults to `<buildDirectory>/<id>.bg`.
    #[arg(long, conflicts_with = "no_store")]
    store: Option<PathBuf>,

    /// Do not store the resolved project.
    #[arg(long)]
    no_store: bool,

    /// List groups and files below each product.
    #[arg(long, short)]
    files: bool,
}

pub fn handle(args: Vec<String>, cancellation_token: &CancellationToken) -> Result<()> {
    let args = ResolveArgs::try_parse_from(&args)?;
    let setup = setup_parameters(&args)?;

    let loaded = item_reader::read_description(&args.description)
        .with_context(|| format!("Cannot read description '{}'", args.description.display()))?;
    let mut evaluator = LiteralEvaluator::new().with_environment(setup.environment.clone());
    let top = ProjectResolver::new(&mut evaluator, loaded, setup)
        .with_cancellation(Arc::clone(cancellation_token))
        .resolve()?;
    log::debug!("Evaluated {} script value(s).", evaluator.evaluations());

    commons::print_project(&top, args.files);

    if args.no_store {
        return Ok(());
    }
    let path = args
        .store
        .unwrap_or_else(|| PathBuf::from(top.build_graph_file_path()));
    persistence::store(&top, &path)?;
    println!("\n{} {}", "Stored".green(), path.display());
    Ok(())
}

/// Loads the setup parameters and applies the command line overrides on top.
fn setup_parameters(args: &ResolveArgs) -> Result<SetupProjectParameters> {
    let mut setup = match &args.config {
        Some(path) => SetupProjectParameters::load(path)
            .with_context(|| format!("Cannot load setup parameters from '{}'", path.display()))?,
        None => SetupProjectParameters::default(),
    };
    if let Some(root) = &args.build_root {
        setup.build_root = root.clone();
    }
    if setup.build_root.is_empty() {
        let dir = args.description.parent().unwrap_or_else(|| Path::new(""));
        setup.build_root = dir.join("build").to_string_lossy().into_owned();
    }
    if args.relaxed {
        setup.product_error_mode = ErrorHandlingMode::Relaxed;
    }
    setup.finalize()?;
    Ok(setup)
}
