// src/core/mod.rs

pub mod error_info;
pub mod evaluator;
pub mod item;
pub mod item_reader;
pub mod loader_result;
pub mod paths;
pub mod persistence;
pub mod product_dependencies;
pub mod project_display;
pub mod project_resolver;
pub mod property_map;
pub mod setup_parameters;
pub mod variant;
pub mod wildcards;

#[cfg(test)]
pub mod test_support;
