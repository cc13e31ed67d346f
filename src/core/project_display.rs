// src/core/project_display.rs

use crate::core::paths;
use crate::models::{ProductId, ProjectId, ResolvedGroup, TopLevelProject};
use colored::Colorize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    /// List every group with its files below each product.
    pub show_files: bool,
}

enum Node {
    Project(ProjectId),
    Product(ProductId),
}

/// Renders the project hierarchy as an ASCII tree.
pub fn render_project_tree(top: &TopLevelProject, options: DisplayOptions) -> String {
    let mut out = String::new();
    let Some(root) = top.root() else {
        out.push_str("No resolved project.\n");
        return out;
    };
    let _ = writeln!(
        out,
        "{} [{}] {}",
        root.name.bold(),
        top.id,
        top.build_directory.dimmed()
    );
    render_children(&mut out, top, TopLevelProject::ROOT, "", options);
    if !top.warnings.is_empty() {
        let _ = writeln!(out, "\n{} warning(s).", top.warnings.len().to_string().yellow());
    }
    out
}

fn render_children(out: &mut String, top: &TopLevelProject, project: ProjectId, prefix: &str, options: DisplayOptions) {
    let project = &top[project];
    let mut nodes: Vec<Node> = project.products.iter().copied().map(Node::Product).collect();
    nodes.extend(project.sub_projects.iter().copied().map(Node::Project));
    let count = nodes.len();
    for (i, node) in nodes.into_iter().enumerate() {
        let is_last = i + 1 == count;
        match node {
            Node::Product(id) => render_product(out, top, id, prefix, is_last, options),
            Node::Project(id) => render_project(out, top, id, prefix, is_last, options),
        }
    }
}

fn render_project(
    out: &mut String,
    top: &TopLevelProject,
    id: ProjectId,
    prefix: &str,
    is_last: bool,
    options: DisplayOptions,
) {
    let connector = if is_last { "└─" } else { "├─" };
    let project = &top[id];
    let name = if project.enabled {
        project.name.bold()
    } else {
        format!("{} (disabled)", project.name).dimmed()
    };
    let _ = writeln!(out, "{}{}{}", prefix, connector, name);
    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    render_children(out, top, id, &child_prefix, options);
}

fn render_product(
    out: &mut String,
    top: &TopLevelProject,
    id: ProductId,
    prefix: &str,
    is_last: bool,
    options: DisplayOptions,
) {
    let connector = if is_last { "└─" } else { "├─" };
    let product = &top[id];
    let types: Vec<&str> = product.file_tags.iter().map(String::as_str).collect();
    let name = product.full_display_name();
    let name = if product.enabled {
        name.green()
    } else {
        format!("{} (disabled)", name).red().dimmed()
    };
    let _ = writeln!(out, "{}{}{} [{}]", prefix, connector, name, types.join(", "));

    let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
    let mut lines: Vec<String> = Vec::new();
    if !product.dependencies.is_empty() {
        let deps: Vec<String> = product
            .dependencies
            .iter()
            .map(|d| top[*d].full_display_name())
            .collect();
        lines.push(format!("depends on: {}", deps.join(", ")));
    }
    if !product.modules.is_empty() {
        let modules: Vec<&str> = product.modules.iter().map(|m| m.name.as_str()).collect();
        lines.push(format!("modules: {}", modules.join(", ").dimmed()));
    }
    let group_count = lines.len();
    if options.show_files {
        lines.extend(product.groups.iter().map(group_line));
    }
    for (i, line) in lines.iter().enumerate() {
        let connector = if i + 1 == lines.len() { "└─" } else { "├─" };
        let _ = writeln!(out, "{}{}{}", child_prefix, connector, line);
        if i >= group_count {
            if let Some(group) = product.groups.get(i - group_count) {
                let file_prefix = format!("{}{}", child_prefix, if i + 1 == lines.len() { "   " } else { "│  " });
                render_files(out, group, &product.source_directory, &file_prefix);
            }
        }
    }
}

fn group_line(group: &ResolvedGroup) -> String {
    let tags: Vec<&str> = group.file_tags.iter().map(String::as_str).collect();
    let line = format!("{} [{}]", group.name, tags.join(", "));
    if group.enabled {
        line
    } else {
        format!("{} (disabled)", line).dimmed().to_string()
    }
}

fn render_files(out: &mut String, group: &ResolvedGroup, source_dir: &str, prefix: &str) {
    let files: Vec<_> = group.all_files().collect();
    for (i, file) in files.iter().enumerate() {
        let connector = if i + 1 == files.len() { "└─" } else { "├─" };
        let path = file
            .absolute_file_path
            .strip_prefix(source_dir)
            .map_or(file.absolute_file_path.as_str(), |p| p.trim_start_matches('/'));
        let tags: Vec<&str> = file.file_tags.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "{}{}{} {}",
            prefix,
            connector,
            paths::from_native_separators(path),
            format!("[{}]", tags.join(", ")).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader_result::ProductDependency;
    use crate::core::test_support::{TreeBuilder, resolve, setup, touch};

    #[test]
    fn test_tree_lists_products_dependencies_and_files() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["main.cpp"]);
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("demo");
        let app = tree.product(root, "app", &[("files", r#"["main.cpp"]"#), ("type", r#"["application"]"#)]);
        let sub = tree.child(root, crate::core::item::ItemType::Project, &[("name", "'libs'")]);
        tree.product(sub, "lib", &[("condition", "false")]);
        tree.depends(app, ProductDependency { is_required: false, ..ProductDependency::by_name("lib") });
        let top = resolve(tree.finish(root), setup(dir.path(), false)).unwrap();

        // --- Execute ---
        let plain = render_project_tree(&top, DisplayOptions::default());
        let with_files = render_project_tree(&top, DisplayOptions { show_files: true });

        // --- Assert ---
        assert!(plain.contains("demo"));
        assert!(plain.contains("├─"));
        assert!(plain.contains("app"));
        assert!(plain.contains("[application]"));
        assert!(plain.contains("└─"));
        assert!(plain.contains("lib (disabled)"));
        assert!(!plain.contains("main.cpp"));
        assert!(with_files.contains("main.cpp"));
    }
}
