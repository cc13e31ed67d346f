// src/core/product_dependencies.rs

//! Resolves `Depends` items between products once every product is known.
//!
//! The resolver fills a [`ProductIndex`] while it walks the tree; this module
//! turns each product's recorded [`ProductDependency`] list into edges,
//! rejects cycles and, in relaxed mode, disables products whose dependencies
//! ended up disabled.

use crate::constants::PROFILE_WILDCARD;
use crate::core::error_info::ErrorInfo;
use crate::core::loader_result::ProductDependency;
use crate::core::project_resolver::{ResolverError, ResolverResult};
use crate::core::setup_parameters::ErrorHandlingMode;
use crate::models::{FileTags, ProductId, TopLevelProject};
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Products by name and by type tag, in registration order.
#[derive(Debug, Default)]
pub struct ProductIndex {
    by_name: BTreeMap<String, Vec<ProductId>>,
    by_type: BTreeMap<String, Vec<ProductId>>,
}

impl ProductIndex {
    pub fn register(&mut self, product: ProductId, name: &str, types: &FileTags) {
        self.by_name.entry(name.to_string()).or_default().push(product);
        for tag in types {
            self.by_type.entry(tag.clone()).or_default().push(product);
        }
    }

    pub fn by_name(&self, name: &str) -> &[ProductId] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn by_type(&self, tag: &str) -> &[ProductId] {
        self.by_type.get(tag).map_or(&[], Vec::as_slice)
    }
}

/// Fills `dependencies` and `dependency_parameters` of every enabled product.
///
/// Returns the warnings produced by relaxed-mode demotions.
///
/// # Errors
/// Unknown required products, dependency cycles and, in strict mode, enabled
/// products depending on disabled ones are [`ResolverError::Fatal`].
pub fn resolve_product_dependencies(
    top: &mut TopLevelProject,
    index: &ProductIndex,
    used_products: &BTreeMap<ProductId, Vec<ProductDependency>>,
    mode: ErrorHandlingMode,
) -> ResolverResult<Vec<ErrorInfo>> {
    for (&product, dependencies) in used_products {
        if !top[product].enabled {
            continue;
        }
        let mut edges: Vec<(ProductId, &ProductDependency)> = Vec::new();
        for dependency in dependencies {
            if !dependency.product_types.is_empty() {
                edges.extend(
                    products_by_type(top, index, product, dependency)
                        .into_iter()
                        .map(|p| (p, dependency)),
                );
                continue;
            }
            if dependency.profile == PROFILE_WILDCARD {
                edges.extend(
                    index
                        .by_name(&dependency.name)
                        .iter()
                        .filter(|p| top[**p].enabled)
                        .filter(|p| !dependency.limit_to_sub_project || top.is_in_parent_project(product, **p))
                        .map(|p| (*p, dependency)),
                );
                continue;
            }
            let Some(found) = find_product(top, index, dependency) else {
                if !dependency.is_required {
                    debug!(
                        "Optional dependency '{}' of product '{}' not found.",
                        dependency.name, top[product].name
                    );
                    continue;
                }
                return Err(ResolverError::fatal(
                    format!(
                        "Product '{}' requested with profile '{}' not found.",
                        dependency.unique_name(),
                        dependency.profile
                    ),
                    top[product].location.clone(),
                ));
            };
            if !top[found].enabled {
                if !dependency.is_required {
                    continue;
                }
                if mode == ErrorHandlingMode::Strict {
                    return Err(ResolverError::Fatal(disabled_dependency_error(top, product, found)));
                }
            }
            edges.push((found, dependency));
        }

        let mut resolved: Vec<ProductId> = edges.iter().map(|(p, _)| *p).collect();
        resolved.sort();
        resolved.dedup();
        for (dependency, declaration) in &edges {
            debug!(
                "Product '{}' depends on '{}'.",
                top[product].full_display_name(),
                top[*dependency].full_display_name()
            );
            if !declaration.parameters.is_empty() {
                top[product]
                    .dependency_parameters
                    .insert(*dependency, declaration.parameters.clone());
            }
        }
        top[product].dependencies = resolved;
    }

    check_for_cycles(top)?;

    let mut warnings = Vec::new();
    if mode == ErrorHandlingMode::Relaxed {
        disable_products_with_disabled_dependencies(top, &mut warnings);
    }
    Ok(warnings)
}

fn products_by_type(
    top: &TopLevelProject,
    index: &ProductIndex,
    product: ProductId,
    dependency: &ProductDependency,
) -> Vec<ProductId> {
    let mut result = Vec::new();
    for tag in &dependency.product_types {
        for &candidate in index.by_type(tag) {
            if candidate == product || !top[candidate].enabled || result.contains(&candidate) {
                continue;
            }
            if dependency.limit_to_sub_project && !top.is_in_parent_project(product, candidate) {
                continue;
            }
            result.push(candidate);
        }
    }
    result
}

/// An exact lookup. Enabled candidates win over disabled ones.
fn find_product(
    top: &TopLevelProject,
    index: &ProductIndex,
    dependency: &ProductDependency,
) -> Option<ProductId> {
    let candidates: Vec<ProductId> = index
        .by_name(&dependency.name)
        .iter()
        .copied()
        .filter(|p| {
            let candidate = &top[*p];
            if !dependency.multiplex_configuration_id.is_empty() {
                return candidate.multiplex_configuration_id == dependency.multiplex_configuration_id;
            }
            dependency.profile.is_empty() || candidate.profile == dependency.profile
        })
        .collect();
    candidates
        .iter()
        .copied()
        .find(|p| top[*p].enabled)
        .or_else(|| candidates.first().copied())
}

fn disabled_dependency_error(top: &TopLevelProject, product: ProductId, dependency: ProductId) -> ErrorInfo {
    let (product, dependency) = (&top[product], &top[dependency]);
    let mut error = ErrorInfo::new(
        format!(
            "Product '{}' depends on '{}',",
            product.full_display_name(),
            dependency.full_display_name()
        ),
        product.location.clone(),
    );
    error.append(
        format!("but product '{}' is disabled.", dependency.full_display_name()),
        dependency.location.clone(),
    );
    error
}

fn check_for_cycles(top: &TopLevelProject) -> ResolverResult<()> {
    let mut checked = HashSet::new();
    let mut branch = HashSet::new();
    for product in top.all_products(TopLevelProject::ROOT) {
        if let Err(mut error) = check_for_cycle(top, product, &mut checked, &mut branch) {
            error.prepend("Cyclic dependencies detected.", Default::default());
            return Err(ResolverError::Fatal(error));
        }
    }
    Ok(())
}

fn check_for_cycle(
    top: &TopLevelProject,
    product: ProductId,
    checked: &mut HashSet<ProductId>,
    branch: &mut HashSet<ProductId>,
) -> Result<(), ErrorInfo> {
    let resolved = &top[product];
    if branch.contains(&product) {
        return Err(ErrorInfo::new(resolved.full_display_name(), resolved.location.clone()));
    }
    if checked.contains(&product) {
        return Ok(());
    }
    branch.insert(product);
    for &dependency in &resolved.dependencies {
        if let Err(mut error) = check_for_cycle(top, dependency, checked, branch) {
            error.prepend(resolved.full_display_name(), resolved.location.clone());
            return Err(error);
        }
    }
    branch.remove(&product);
    checked.insert(product);
    Ok(())
}

/// Disables enabled products with a disabled dependency until nothing changes.
fn disable_products_with_disabled_dependencies(top: &mut TopLevelProject, warnings: &mut Vec<ErrorInfo>) {
    loop {
        let demoted: Vec<(ProductId, ProductId)> = top
            .all_products(TopLevelProject::ROOT)
            .into_iter()
            .filter(|p| top[*p].enabled)
            .filter_map(|p| {
                top[p]
                    .dependencies
                    .iter()
                    .find(|d| !top[**d].enabled)
                    .map(|d| (p, *d))
            })
            .collect();
        if demoted.is_empty() {
            return;
        }
        for (product, dependency) in demoted {
            warnings.push(disabled_dependency_error(top, product, dependency));
            top[product].enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{TreeBuilder, resolve, setup, tags};

    #[test]
    fn test_cycle_is_reported_with_every_member() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("cycle");
        let a = tree.product(root, "A", &[]);
        let b = tree.product(root, "B", &[]);
        let c = tree.product(root, "C", &[]);
        tree.depends(a, ProductDependency::by_name("B"));
        tree.depends(b, ProductDependency::by_name("C"));
        tree.depends(c, ProductDependency::by_name("A"));

        // --- Execute ---
        let err = resolve(tree.finish(root), setup(dir.path(), false)).unwrap_err();

        // --- Assert ---
        assert!(err.is_fatal());
        let info = err.info();
        assert!(info.mentions("Cyclic dependencies detected."));
        for name in ["A", "B", "C"] {
            assert!(info.items().iter().any(|i| i.description == name), "{name} missing");
        }
    }

    #[test]
    fn test_diamond_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("diamond");
        let a = tree.product(root, "A", &[]);
        let b = tree.product(root, "B", &[]);
        let c = tree.product(root, "C", &[]);
        tree.product(root, "D", &[]);
        tree.depends(a, ProductDependency::by_name("B"));
        tree.depends(a, ProductDependency::by_name("C"));
        tree.depends(b, ProductDependency::by_name("D"));
        tree.depends(c, ProductDependency::by_name("D"));

        let top = resolve(tree.finish(root), setup(dir.path(), false)).unwrap();

        let a = top.product_by_unique_name("A").unwrap();
        let names: Vec<&str> = top[a].dependencies.iter().map(|d| top[*d].name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        let d = top.product_by_unique_name("D").unwrap();
        assert!(top[d].dependencies.is_empty());
    }

    #[test]
    fn test_disabled_dependency_demotes_dependents_in_relaxed_mode() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("relaxed");
        let app = tree.product(root, "app", &[]);
        let tool = tree.product(root, "tool", &[]);
        tree.product(root, "lib", &[("condition", "false")]);
        tree.depends(app, ProductDependency::by_name("tool"));
        tree.depends(tool, ProductDependency::by_name("lib"));

        // --- Execute ---
        let top = resolve(tree.finish(root), setup(dir.path(), true)).unwrap();

        // --- Assert ---
        for name in ["app", "tool", "lib"] {
            let id = top.product_by_unique_name(name).unwrap();
            assert!(!top[id].enabled, "{name} should be disabled");
        }
        assert_eq!(top.warnings.len(), 2);
        assert!(top.warnings.iter().all(|w| w.mentions("is disabled.")));
    }

    #[test]
    fn test_disabled_dependency_fails_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("strict");
        let app = tree.product(root, "app", &[]);
        tree.product(root, "lib", &[("condition", "false")]);
        tree.depends(app, ProductDependency::by_name("lib"));

        let err = resolve(tree.finish(root), setup(dir.path(), false)).unwrap_err();

        assert!(err.info().mentions("Product 'app' depends on 'lib',"));
        assert!(err.info().mentions("but product 'lib' is disabled."));
    }

    #[test]
    fn test_optional_and_missing_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("missing");
        let app = tree.product(root, "app", &[]);
        tree.depends(
            app,
            ProductDependency {
                is_required: false,
                ..ProductDependency::by_name("ghost")
            },
        );
        let loaded = tree.finish(root);
        let top = resolve(loaded.clone(), setup(dir.path(), false)).unwrap();
        assert!(top.products.iter().all(|p| p.dependencies.is_empty()));

        let mut loaded = loaded;
        if let Some(info) = loaded.product_infos.values_mut().next() {
            info.used_products = vec![ProductDependency {
                profile: "arm".into(),
                ..ProductDependency::by_name("ghost")
            }];
        }
        let err = resolve(loaded, setup(dir.path(), false)).unwrap_err();
        assert!(err.info().mentions("Product 'ghost' requested with profile 'arm' not found."));
    }

    #[test]
    fn test_dependencies_by_type_and_wildcard_profile() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("types");
        let app = tree.product(root, "app", &[("type", r#"["application"]"#)]);
        tree.product(root, "core", &[("type", r#"["staticlibrary"]"#)]);
        tree.product(root, "gui", &[("type", r#"["staticlibrary"]"#)]);
        tree.product(
            root,
            "plugin",
            &[("multiplexConfigurationId", "'x64'"), ("type", r#"["plugin"]"#)],
        );
        tree.product(
            root,
            "plugin",
            &[("multiplexConfigurationId", "'arm'"), ("type", r#"["plugin"]"#)],
        );
        let mut params = crate::core::variant::VariantMap::new();
        params.insert("link".into(), crate::core::variant::Variant::Bool(false));
        tree.depends(
            app,
            ProductDependency {
                parameters: params.clone(),
                ..ProductDependency::by_type(tags(&["staticlibrary"]))
            },
        );
        tree.depends(
            app,
            ProductDependency {
                profile: PROFILE_WILDCARD.into(),
                ..ProductDependency::by_name("plugin")
            },
        );

        // --- Execute ---
        let top = resolve(tree.finish(root), setup(dir.path(), false)).unwrap();

        // --- Assert ---
        let app = top.product_by_unique_name("app").unwrap();
        let names: Vec<String> = top[app]
            .dependencies
            .iter()
            .map(|d| top[*d].unique_name())
            .collect();
        assert_eq!(names, vec!["core", "gui", "plugin.x64", "plugin.arm"]);
        let core = top.product_by_unique_name("core").unwrap();
        assert_eq!(top[app].dependency_parameters.get(&core), Some(&params));
    }

    #[test]
    fn test_wildcard_profile_honours_sub_project_limit() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let mut tree = TreeBuilder::new(dir.path());
        let root = tree.project("limits");
        let sub = tree.child(root, crate::core::item::ItemType::Project, &[("name", "'sub'")]);
        let app = tree.product(sub, "app", &[]);
        tree.product(sub, "plugin", &[("multiplexConfigurationId", "'in'")]);
        tree.product(root, "plugin", &[("multiplexConfigurationId", "'out'")]);
        tree.depends(
            app,
            ProductDependency {
                profile: PROFILE_WILDCARD.into(),
                limit_to_sub_project: true,
                ..ProductDependency::by_name("plugin")
            },
        );

        // --- Execute ---
        let top = resolve(tree.finish(root), setup(dir.path(), false)).unwrap();

        // --- Assert ---
        let app = top.product_by_unique_name("app").unwrap();
        let names: Vec<String> = top[app]
            .dependencies
            .iter()
            .map(|d| top[*d].unique_name())
            .collect();
        assert_eq!(names, vec!["plugin.in"]);
    }
}
