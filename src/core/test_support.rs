// src/core/test_support.rs

//! Programmatic item trees for resolver tests.

use crate::core::error_info::CodeLocation;
use crate::core::evaluator::LiteralEvaluator;
use crate::core::item::{FileContext, Item, ItemId, ItemModule, ItemPool, ItemType, JsSourceValue, Value, qualified_id};
use crate::core::loader_result::{ModuleLoaderResult, ProductDependency};
use crate::core::project_resolver::{ProjectResolver, ResolverResult};
use crate::core::setup_parameters::{ErrorHandlingMode, SetupProjectParameters};
use crate::core::variant::{Variant, VariantMap};
use crate::models::{FileTags, TopLevelProject};
use std::path::Path;
use std::sync::Arc;

/// Builds an item tree whose items all live in `<dir>/project.qbs`, one item
/// per line. Property values are literal script sources.
pub struct TreeBuilder {
    loaded: ModuleLoaderResult,
    file: Arc<FileContext>,
    next_line: u32,
}

impl TreeBuilder {
    pub fn new(dir: &Path) -> Self {
        let file_path = format!("{}/project.qbs", dir.display());
        let mut loaded = ModuleLoaderResult::default();
        loaded.qbs_files.insert(file_path.clone());
        Self {
            loaded,
            file: Arc::new(FileContext {
                file_path,
                ..FileContext::default()
            }),
            next_line: 1,
        }
    }

    pub fn pool(&mut self) -> &mut ItemPool {
        &mut self.loaded.item_pool
    }

    fn location(&mut self) -> CodeLocation {
        let line = self.next_line;
        self.next_line += 1;
        CodeLocation::new(self.file.file_path.clone(), line, 5)
    }

    /// A detached item with literal properties.
    pub fn item(&mut self, item_type: ItemType, properties: &[(&str, &str)]) -> ItemId {
        let mut item = Item::new(item_type, self.location());
        item.file = Some(Arc::clone(&self.file));
        let id = self.loaded.item_pool.add(item);
        for (name, source) in properties {
            self.set(id, name, source);
        }
        id
    }

    pub fn set(&mut self, item: ItemId, name: &str, source: &str) {
        let location = self.location();
        self.loaded.item_pool[item].set_property(name, Value::JsSource(JsSourceValue::new(source, location)));
    }

    pub fn set_value(&mut self, item: ItemId, name: &str, value: Value) {
        self.loaded.item_pool[item].set_property(name, value);
    }

    /// An item added as the last child of `parent`.
    pub fn child(&mut self, parent: ItemId, item_type: ItemType, properties: &[(&str, &str)]) -> ItemId {
        let id = self.item(item_type, properties);
        self.loaded.item_pool.add_child(parent, id);
        id
    }

    pub fn project(&mut self, name: &str) -> ItemId {
        self.item(ItemType::Project, &[("name", &format!("'{}'", name))])
    }

    pub fn product(&mut self, parent: ItemId, name: &str, properties: &[(&str, &str)]) -> ItemId {
        let id = self.child(parent, ItemType::Product, &[("name", &format!("'{}'", name))]);
        for (key, source) in properties {
            self.set(id, key, source);
        }
        self.loaded.product_infos.entry(id).or_default();
        id
    }

    pub fn group(&mut self, parent: ItemId, properties: &[(&str, &str)]) -> ItemId {
        self.child(parent, ItemType::Group, properties)
    }

    /// Attaches a new module instance `name` to `owner`.
    pub fn module(&mut self, owner: ItemId, name: &str, properties: &[(&str, &str)]) -> ItemId {
        let id = self.item(ItemType::Module, properties);
        self.use_module(owner, name, id);
        id
    }

    /// Attaches an existing module instance to `owner`.
    pub fn use_module(&mut self, owner: ItemId, name: &str, module: ItemId) {
        self.loaded.item_pool[owner].modules.push(ItemModule {
            name: qualified_id(name),
            item: module,
            is_product: false,
            parameters: VariantMap::new(),
        });
    }

    pub fn depends(&mut self, product: ItemId, dependency: ProductDependency) {
        self.loaded
            .product_infos
            .entry(product)
            .or_default()
            .used_products
            .push(dependency);
    }

    pub fn finish(mut self, root: ItemId) -> ModuleLoaderResult {
        self.loaded.root = Some(root);
        self.loaded
    }
}

pub fn setup(build_root: &Path, relaxed: bool) -> SetupProjectParameters {
    let mut qbs = VariantMap::new();
    qbs.insert("configurationName".into(), Variant::from("debug"));
    let mut build_configuration = VariantMap::new();
    build_configuration.insert("qbs".into(), Variant::Map(qbs));
    SetupProjectParameters {
        build_root: format!("{}/build", build_root.display()),
        configuration_name: "debug".into(),
        top_level_profile: "default".into(),
        build_configuration,
        product_error_mode: if relaxed {
            ErrorHandlingMode::Relaxed
        } else {
            ErrorHandlingMode::Strict
        },
        ..SetupProjectParameters::default()
    }
}

pub fn resolve(loaded: ModuleLoaderResult, setup: SetupProjectParameters) -> ResolverResult<TopLevelProject> {
    let mut evaluator = LiteralEvaluator::new();
    ProjectResolver::new(&mut evaluator, loaded, setup).resolve()
}

pub fn tags(list: &[&str]) -> FileTags {
    list.iter().map(|t| t.to_string()).collect()
}

/// Creates empty files below `dir`.
pub fn touch(dir: &Path, files: &[&str]) {
    for file in files {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "").unwrap();
    }
}
