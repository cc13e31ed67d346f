// src/core/item.rs

//! # Item Tree
//!
//! The loaded build description, as produced by the (external) item loader.
//! Items live in an [`ItemPool`] arena and refer to each other through
//! [`ItemId`]s: children, prototypes, scopes and module instances are all
//! plain indices, so the tree can be shared freely without reference cycles.
//!
//! The resolver only reads the pool, with one exception: it may add a
//! synthetic `Group` item for products that list their files directly.

use crate::core::error_info::CodeLocation;
use crate::core::variant::{Variant, VariantMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Handle to an [`Item`] inside its [`ItemPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dotted module or property name, split into its segments.
pub type QualifiedId = Vec<String>;

/// Joins a qualified id with `.`.
pub fn qualified_name(id: &[String]) -> String {
    id.join(".")
}

/// Splits a dotted name into a [`QualifiedId`].
pub fn qualified_id(name: &str) -> QualifiedId {
    name.split('.').map(str::to_string).collect()
}

/// The closed set of item kinds the resolver knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Project,
    SubProject,
    PropertiesInSubProject,
    Product,
    Module,
    Group,
    Rule,
    Artifact,
    FileTagger,
    Scanner,
    Depends,
    Export,
    Probe,
    PropertyOptions,
    Properties,
    Parameter,
    Unknown,
}

impl ItemType {
    const NAMES: &'static [(Self, &'static str)] = &[
        (Self::Project, "Project"),
        (Self::SubProject, "SubProject"),
        (Self::PropertiesInSubProject, "PropertiesInSubProject"),
        (Self::Product, "Product"),
        (Self::Module, "Module"),
        (Self::Group, "Group"),
        (Self::Rule, "Rule"),
        (Self::Artifact, "Artifact"),
        (Self::FileTagger, "FileTagger"),
        (Self::Scanner, "Scanner"),
        (Self::Depends, "Depends"),
        (Self::Export, "Export"),
        (Self::Probe, "Probe"),
        (Self::PropertyOptions, "PropertyOptions"),
        (Self::Properties, "Properties"),
        (Self::Parameter, "Parameter"),
    ];

    pub fn from_name(name: &str) -> Self {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map_or(Self::Unknown, |(t, _)| *t)
    }

    pub fn as_str(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(t, _)| *t == self)
            .map_or("<unknown>", |(_, n)| n)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `import` statement of a description file, made available to its scripts.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct JsImport {
    pub scope_name: String,
    pub file_paths: Vec<String>,
    pub location: CodeLocation,
}

/// The source file an item was declared in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContext {
    pub file_path: String,
    pub search_paths: Vec<String>,
    pub js_imports: Vec<JsImport>,
    pub js_extensions: Vec<String>,
}

/// A property bound to script source code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsSourceValue {
    pub source_code: String,
    /// The code is a function body (`{ ... }`) rather than an expression.
    pub has_function_form: bool,
    pub location: CodeLocation,
    /// The binding comes from a built-in default, not from user code.
    pub is_builtin_default: bool,
}

impl JsSourceValue {
    pub fn new(source_code: impl Into<String>, location: CodeLocation) -> Self {
        Self {
            source_code: source_code.into(),
            location,
            ..Self::default()
        }
    }

    /// Source text in a form that evaluates to the property's value.
    ///
    /// Function-form bodies are wrapped into an immediately invoked function.
    pub fn source_code_for_evaluation(&self) -> String {
        if self.has_function_form {
            format!("(function(){})()", self.source_code)
        } else {
            self.source_code.clone()
        }
    }
}

/// The value side of an item property.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Script source, evaluated on demand by the [`Evaluator`](crate::core::evaluator::Evaluator).
    JsSource(JsSourceValue),
    /// A nested item, e.g. a module instance or a property group like `cpp: { ... }`.
    Item(ItemId),
    /// A value already known at load time.
    Variant(Variant),
}

/// Declared type of a property, used to post-process evaluated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyType {
    Boolean,
    Integer,
    String,
    Path,
    StringList,
    PathList,
    #[default]
    Variant,
    VariantList,
    /// Kept as source text, never evaluated by the resolver.
    Verbatim,
}

impl PropertyType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "bool" => Self::Boolean,
            "int" => Self::Integer,
            "string" => Self::String,
            "path" => Self::Path,
            "stringList" => Self::StringList,
            "pathList" => Self::PathList,
            "varList" => Self::VariantList,
            "verbatim" => Self::Verbatim,
            _ => Self::Variant,
        }
    }
}

/// The declaration of a property on an item or module prototype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDeclaration {
    pub name: String,
    pub property_type: PropertyType,
    pub function_argument_names: Vec<String>,
    /// Cleared for properties that must not end up in evaluated snapshots.
    pub available_in_config: bool,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            function_argument_names: Vec::new(),
            available_in_config: true,
        }
    }
}

/// A module instance attached to an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemModule {
    pub name: QualifiedId,
    pub item: ItemId,
    /// The module stands for a product the owner depends on.
    pub is_product: bool,
    /// Parameters given by the `Depends` item that pulled the module in.
    pub parameters: VariantMap,
}

/// One node of the loaded build description.
#[derive(Debug, Clone)]
pub struct Item {
    pub item_type: ItemType,
    pub location: CodeLocation,
    pub file: Option<Arc<FileContext>>,
    pub properties: BTreeMap<String, Value>,
    pub property_declarations: BTreeMap<String, PropertyDeclaration>,
    pub children: Vec<ItemId>,
    pub prototype: Option<ItemId>,
    pub scope: Option<ItemId>,
    pub modules: Vec<ItemModule>,
}

impl Item {
    pub fn new(item_type: ItemType, location: CodeLocation) -> Self {
        Self {
            item_type,
            location,
            file: None,
            properties: BTreeMap::new(),
            property_declarations: BTreeMap::new(),
            children: Vec::new(),
            prototype: None,
            scope: None,
            modules: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn source_property(&self, name: &str) -> Option<&JsSourceValue> {
        match self.properties.get(name) {
            Some(Value::JsSource(src)) => Some(src),
            _ => None,
        }
    }

    pub fn variant_property(&self, name: &str) -> Option<&Variant> {
        match self.properties.get(name) {
            Some(Value::Variant(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Path of the file this item was declared in, or an empty string.
    pub fn file_path(&self) -> &str {
        self.file.as_deref().map_or("", |f| f.file_path.as_str())
    }
}

/// Arena owning every item of a loaded build description.
#[derive(Debug, Default, Clone)]
pub struct ItemPool {
    items: Vec<Item>,
}

impl ItemPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: Item) -> ItemId {
        self.items.push(item);
        ItemId(self.items.len() - 1)
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends `child` to `parent`'s children.
    pub fn add_child(&mut self, parent: ItemId, child: ItemId) {
        if let Some(p) = self.items.get_mut(parent.0) {
            p.children.push(child);
        }
    }

    /// Looks up a property declaration on `id` or any of its prototypes.
    pub fn property_declaration(&self, id: ItemId, name: &str) -> Option<&PropertyDeclaration> {
        self.prototype_chain(id)
            .find_map(|item| item.property_declarations.get(name))
    }

    /// Iterates `id` followed by its prototypes, nearest first.
    pub fn prototype_chain(&self, id: ItemId) -> impl Iterator<Item = &Item> + '_ {
        std::iter::successors(self.get(id), move |item| {
            item.prototype.and_then(|p| self.get(p))
        })
    }

    /// The first child of `id` with the given type.
    pub fn child_of_type(&self, id: ItemId, item_type: ItemType) -> Option<ItemId> {
        self[id]
            .children
            .iter()
            .copied()
            .find(|c| self[*c].item_type == item_type)
    }
}

// Ids are only minted by `add`, so they always point inside the arena.
#[allow(clippy::indexing_slicing)]
impl Index<ItemId> for ItemPool {
    type Output = Item;

    fn index(&self, id: ItemId) -> &Item {
        &self.items[id.0]
    }
}

#[allow(clippy::indexing_slicing)]
impl IndexMut<ItemId> for ItemPool {
    fn index_mut(&mut self, id: ItemId) -> &mut Item {
        &mut self.items[id.0]
    }
}
