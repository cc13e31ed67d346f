//! # projgraph
//!
//! Resolves a loaded, hierarchical build description (projects, products,
//! groups, modules, rules) into a fully evaluated project model that a
//! build-graph executor can consume.
//!
//! The entry point is [`core::project_resolver::ProjectResolver`], which takes a
//! [`core::loader_result::ModuleLoaderResult`] and an [`core::evaluator::Evaluator`]
//! and produces a [`models::TopLevelProject`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Cooperative cancellation flag polled by long-running operations.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
