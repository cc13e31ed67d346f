// src/core/item_reader.rs

//! # Item-Tree Descriptions
//!
//! Reads a JSON description of a loaded item tree into a
//! [`ModuleLoaderResult`]. This is what the command line tool feeds the
//! resolver in place of a full item loader.
//!
//! ```json
//! {
//!   "root": {
//!     "type": "Project",
//!     "file": "project.qbs",
//!     "properties": { "name": "'demo'" },
//!     "children": [{
//!       "type": "Product",
//!       "line": 3,
//!       "properties": {
//!         "name": "'app'",
//!         "files": "[\"main.cpp\"]",
//!         "builtByDefault": { "value": true }
//!       },
//!       "modules": [{ "name": "cpp", "item": { "type": "Module", "id": "cpp" } }],
//!       "depends": [{ "name": "lib" }]
//!     }]
//!   }
//! }
//! ```
//!
//! A property is either a string (script source), `{ "value": <json> }` (a
//! known value), `{ "source": "...", "functionForm": true, "line": 4 }`, or
//! `{ "item": { ... } }` (a nested item). A module entry may reference an
//! item declared earlier with `"ref": "<id>"` instead of declaring a new one,
//! which is how shared module instances are written. Files are resolved
//! relative to the description and inherited from the enclosing item.

use crate::core::error_info::{CodeLocation, ErrorInfo};
use crate::core::item::{
    FileContext, Item, ItemId, ItemModule, ItemType, JsSourceValue, PropertyDeclaration, PropertyType,
    Value, qualified_id,
};
use crate::core::loader_result::{ModuleLoaderResult, ProductDependency};
use crate::core::paths;
use crate::core::variant::{Variant, VariantMap};
use crate::models::FileTags;
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItemReaderError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid description '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown item type '{type_name}' at {location}.")]
    UnknownItemType { type_name: String, location: CodeLocation },

    #[error("Module '{module}' references unknown item '{reference}'.")]
    UnknownReference { module: String, reference: String },

    #[error("Module '{0}' needs either an 'item' or a 'ref'.")]
    EmptyModule(String),
}

pub type ItemReaderResult<T> = Result<T, ItemReaderError>;

// --- Description format ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Description {
    root: ItemDescription,
    #[serde(default)]
    profile_configs: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct ItemDescription {
    #[serde(rename = "type")]
    item_type: String,
    id: Option<String>,
    file: Option<String>,
    line: u32,
    column: u32,
    search_paths: Vec<String>,
    properties: BTreeMap<String, PropertyDescription>,
    declarations: BTreeMap<String, DeclarationDescription>,
    children: Vec<ItemDescription>,
    modules: Vec<ModuleDescription>,
    prototype: Option<Box<ItemDescription>>,
    depends: Vec<DependsDescription>,
    delayed_error: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PropertyDescription {
    Source(String),
    Value {
        value: serde_json::Value,
    },
    Script {
        source: String,
        #[serde(default, rename = "functionForm")]
        function_form: bool,
        #[serde(default)]
        line: u32,
    },
    Item {
        item: Box<ItemDescription>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DeclarationDescription {
    #[serde(rename = "type", default)]
    property_type: String,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default = "default_true")]
    available_in_config: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModuleDescription {
    name: String,
    item: Option<ItemDescription>,
    #[serde(rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    is_product: bool,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DependsDescription {
    #[serde(default)]
    name: String,
    #[serde(default)]
    product_types: Vec<String>,
    #[serde(default)]
    profile: String,
    #[serde(default)]
    multiplex_configuration_id: String,
    #[serde(default)]
    limit_to_sub_project: bool,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn to_variant_map(map: serde_json::Map<String, serde_json::Value>) -> VariantMap {
    map.into_iter().map(|(k, v)| (k, Variant::from(v))).collect()
}

// --- Reader ---

/// Reads the description at `path`.
///
/// # Errors
/// Returns [`ItemReaderError::Io`] or [`ItemReaderError::Json`] for unreadable
/// files, and the other variants for descriptions that do not form a valid tree.
pub fn read_description(path: &Path) -> ItemReaderResult<ModuleLoaderResult> {
    let content = fs::read_to_string(path).map_err(|source| ItemReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let base_dir = paths::absolute_simplified(parent).map_err(|source| ItemReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = paths::clean_path(&base_dir.to_string_lossy());
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_description(&content, &base_dir, &file_name).map_err(|e| match e {
        ItemReaderError::Json { source, .. } => ItemReaderError::Json {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses a description held in memory. Relative file names are resolved
/// against `base_dir`; items without a file belong to `default_file`.
///
/// # Errors
/// Same as [`read_description`], minus I/O.
pub fn parse_description(content: &str, base_dir: &str, default_file: &str) -> ItemReaderResult<ModuleLoaderResult> {
    let description: Description = serde_json::from_str(content).map_err(|source| ItemReaderError::Json {
        path: PathBuf::from(default_file),
        source,
    })?;
    let mut reader = Reader {
        base_dir: base_dir.to_string(),
        result: ModuleLoaderResult::default(),
        files: HashMap::new(),
        named_items: HashMap::new(),
    };
    let default_file = reader.file_context(default_file, &[]);
    let root = reader.read_item(description.root, &default_file)?;
    reader.result.root = Some(root);
    reader.result.profile_configs = description
        .profile_configs
        .into_iter()
        .map(|(name, config)| (name, to_variant_map(config)))
        .collect();
    debug!(
        "Read {} item(s) from {} file(s).",
        reader.result.item_pool.len(),
        reader.result.qbs_files.len()
    );
    Ok(reader.result)
}

struct Reader {
    base_dir: String,
    result: ModuleLoaderResult,
    files: HashMap<String, Arc<FileContext>>,
    named_items: HashMap<String, ItemId>,
}

impl Reader {
    fn file_context(&mut self, file: &str, search_paths: &[String]) -> Arc<FileContext> {
        let file_path = paths::resolve_path(&self.base_dir, file);
        self.result.qbs_files.insert(file_path.clone());
        let context = self.files.entry(file_path.clone()).or_insert_with(|| {
            Arc::new(FileContext {
                file_path,
                search_paths: search_paths.to_vec(),
                ..FileContext::default()
            })
        });
        Arc::clone(context)
    }

    fn read_item(&mut self, description: ItemDescription, parent_file: &Arc<FileContext>) -> ItemReaderResult<ItemId> {
        let file = match &description.file {
            Some(file) => self.file_context(file, &description.search_paths),
            None => Arc::clone(parent_file),
        };
        let location = CodeLocation::new(file.file_path.clone(), description.line, description.column);
        let item_type = ItemType::from_name(&description.item_type);
        if item_type == ItemType::Unknown {
            return Err(ItemReaderError::UnknownItemType {
                type_name: description.item_type,
                location,
            });
        }

        let mut item = Item::new(item_type, location.clone());
        item.file = Some(Arc::clone(&file));
        for (name, declaration) in description.declarations {
            item.property_declarations.insert(
                name.clone(),
                PropertyDeclaration {
                    name,
                    property_type: PropertyType::from_name(&declaration.property_type),
                    function_argument_names: declaration.arguments,
                    available_in_config: declaration.available_in_config,
                },
            );
        }
        let id = self.result.item_pool.add(item);
        if let Some(name) = description.id {
            self.named_items.insert(name, id);
        }

        if let Some(prototype) = description.prototype {
            let prototype = self.read_item(*prototype, &file)?;
            self.result.item_pool[id].prototype = Some(prototype);
        }
        for (name, property) in description.properties {
            let value = match property {
                PropertyDescription::Source(source) => Value::JsSource(JsSourceValue::new(source, location.clone())),
                PropertyDescription::Value { value } => Value::Variant(Variant::from(value)),
                PropertyDescription::Script {
                    source,
                    function_form,
                    line,
                } => {
                    let line = if line > 0 { line } else { location.line };
                    let mut value =
                        JsSourceValue::new(source, CodeLocation::new(file.file_path.clone(), line, 0));
                    value.has_function_form = function_form;
                    Value::JsSource(value)
                }
                PropertyDescription::Item { item } => {
                    let nested = self.read_item(*item, &file)?;
                    self.result.item_pool[nested].scope = Some(id);
                    Value::Item(nested)
                }
            };
            self.result.item_pool[id].set_property(name, value);
        }
        for module in description.modules {
            let item = match (module.item, module.reference) {
                (Some(item), _) => self.read_item(item, &file)?,
                (None, Some(reference)) => {
                    *self
                        .named_items
                        .get(&reference)
                        .ok_or_else(|| ItemReaderError::UnknownReference {
                            module: module.name.clone(),
                            reference,
                        })?
                }
                (None, None) => return Err(ItemReaderError::EmptyModule(module.name)),
            };
            self.result.item_pool[id].modules.push(ItemModule {
                name: qualified_id(&module.name),
                item,
                is_product: module.is_product,
                parameters: to_variant_map(module.parameters),
            });
        }
        for child in description.children {
            let child = self.read_item(child, &file)?;
            self.result.item_pool[child].scope = Some(id);
            self.result.item_pool.add_child(id, child);
        }

        if item_type == ItemType::Product {
            let info = self.result.product_infos.entry(id).or_default();
            info.used_products = description
                .depends
                .into_iter()
                .map(|d| ProductDependency {
                    product_types: d.product_types.into_iter().collect::<FileTags>(),
                    name: d.name,
                    profile: d.profile,
                    multiplex_configuration_id: d.multiplex_configuration_id,
                    limit_to_sub_project: d.limit_to_sub_project,
                    is_required: d.required,
                    parameters: to_variant_map(d.parameters),
                })
                .collect();
            info.delayed_error = description
                .delayed_error
                .map(|message| ErrorInfo::new(message, location));
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{resolve, setup};

    const DESCRIPTION: &str = r#"{
        "root": {
            "type": "Project",
            "file": "project.qbs",
            "line": 1,
            "properties": { "name": "'demo'" },
            "children": [
                {
                    "type": "Product",
                    "line": 3,
                    "properties": {
                        "name": "'app'",
                        "type": "[\"application\"]",
                        "builtByDefault": { "value": false },
                        "prepare": { "source": "{ return []; }", "functionForm": true, "line": 7 }
                    },
                    "declarations": { "prepare": { "type": "verbatim", "arguments": ["project"] } },
                    "modules": [
                        { "name": "base", "item": { "type": "Module", "id": "base" } },
                        { "name": "cpp", "item": {
                            "type": "Module",
                            "file": "modules/cpp.qbs",
                            "properties": { "defines": "[\"X\"]" },
                            "modules": [{ "name": "base", "ref": "base" }]
                        } }
                    ],
                    "depends": [{ "name": "lib", "required": false, "parameters": { "link": false } }]
                },
                { "type": "Product", "line": 20, "properties": { "name": "'lib'" }, "delayedError": "broken" }
            ]
        },
        "profileConfigs": { "gcc": { "cpp": { "toolchain": "gcc" } } }
    }"#;

    #[test]
    fn test_parse_description() {
        // --- Execute ---
        let loaded = parse_description(DESCRIPTION, "/work", "desc.json").unwrap();

        // --- Assert ---
        let pool = &loaded.item_pool;
        let root = loaded.root.unwrap();
        assert_eq!(pool[root].item_type, ItemType::Project);
        assert_eq!(pool[root].file_path(), "/work/project.qbs");
        let app = pool[root].children[0];
        assert_eq!(pool[app].location.line, 3);
        assert_eq!(pool[app].file_path(), "/work/project.qbs");
        assert_eq!(
            pool[app].variant_property("builtByDefault"),
            Some(&Variant::Bool(false))
        );
        let prepare = pool[app].source_property("prepare").unwrap();
        assert!(prepare.has_function_form);
        assert_eq!(prepare.location.line, 7);
        assert_eq!(
            pool.property_declaration(app, "prepare").map(|d| d.property_type),
            Some(PropertyType::Verbatim)
        );

        let base = pool[app].modules[0].item;
        let cpp = pool[app].modules[1].item;
        assert_eq!(pool[cpp].file_path(), "/work/modules/cpp.qbs");
        assert_eq!(pool[cpp].modules[0].item, base);

        let info = &loaded.product_infos[&app];
        assert_eq!(info.used_products.len(), 1);
        assert!(!info.used_products[0].is_required);
        let lib = pool[root].children[1];
        assert!(loaded.product_infos[&lib].delayed_error.is_some());
        assert!(loaded.qbs_files.contains("/work/modules/cpp.qbs"));
        assert!(loaded.profile_configs.contains_key("gcc"));
    }

    #[test]
    fn test_described_tree_resolves_in_relaxed_mode() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = parse_description(DESCRIPTION, &dir.path().to_string_lossy(), "desc.json").unwrap();

        let top = resolve(loaded, setup(dir.path(), true)).unwrap();

        let app = top.product_by_unique_name("app").unwrap();
        assert!(top[app].enabled);
        assert!(!top[app].built_by_default());
        let modules: Vec<&str> = top[app].modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(modules, vec!["base", "cpp"]);
        let lib = top.product_by_unique_name("lib").unwrap();
        assert!(!top[lib].enabled);
    }

    #[test]
    fn test_reader_errors() {
        let unknown = r#"{ "root": { "type": "Widget", "line": 2 } }"#;
        assert!(matches!(
            parse_description(unknown, "/w", "d.json"),
            Err(ItemReaderError::UnknownItemType { .. })
        ));

        let dangling = r#"{ "root": { "type": "Project", "modules": [{ "name": "x", "ref": "nope" }] } }"#;
        let err = parse_description(dangling, "/w", "d.json").unwrap_err();
        assert_eq!(err.to_string(), "Module 'x' references unknown item 'nope'.");

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();
        let err = read_description(&file).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
