// src/cli/handlers/commons.rs

use crate::core::project_display::{self, DisplayOptions};
use crate::models::TopLevelProject;
use colored::*;

/// Prints the project tree followed by every recorded warning.
pub fn print_project(top: &TopLevelProject, show_files: bool) {
    println!();
    print!("{}", project_display::render_project_tree(top, DisplayOptions { show_files }));
    for warning in &top.warnings {
        eprintln!("{}: {}", "Warning".yellow().bold(), warning);
    }
}
