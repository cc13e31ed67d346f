// src/core/project_resolver.rs

//! # Project Resolver
//!
//! Walks a loaded item tree and turns it into a [`TopLevelProject`].
//!
//! ## Phases
//!
//! 1. **Tree walk.** Projects, sub-projects and products are resolved in
//!    declaration order. Each product evaluates its property snapshot, its
//!    groups (files, tags, per-group property maps), rules, file taggers and,
//!    breadth-first, its modules. Children of each context are dispatched
//!    through a fixed item-type table, so the set of legal child kinds per
//!    context is explicit.
//! 2. **Cross-product checks.** Unique product names, then inter-product
//!    dependencies (see [`product_dependencies`](crate::core::product_dependencies)).
//! 3. **Sweep.** File taggers and artifact properties are applied to every
//!    enabled file, and files with a truthy `qbs.install` get tagged
//!    `installable`.
//!
//! ## Error severities
//!
//! [`ResolverError::Entity`] errors concern a single product, group or rule.
//! In [`ErrorHandlingMode::Relaxed`] the offending entity is disabled and the
//! error becomes a warning; in strict mode it aborts resolution.
//! [`ResolverError::Fatal`] errors abort in either mode.

use crate::CancellationToken;
use crate::constants::*;
use crate::core::error_info::{CodeLocation, ErrorInfo};
use crate::core::evaluator::{EvaluationError, Evaluator};
use crate::core::item::{
    Item, ItemId, ItemModule, ItemPool, ItemType, JsSourceValue, PropertyType, QualifiedId, Value,
    qualified_name,
};
use crate::core::loader_result::{ModuleLoaderResult, ProductDependency};
use crate::core::paths;
use crate::core::product_dependencies::{self, ProductIndex};
use crate::core::property_map::{self, PropertyMap};
use crate::core::setup_parameters::{ErrorHandlingMode, SetupProjectParameters};
use crate::core::variant::{Variant, VariantMap};
use crate::core::wildcards::SourceWildCards;
use crate::models::{
    ArtifactProperties, FileTagger, FileTags, FileTime, ProductId, ProjectId, ResolvedFileContext,
    ResolvedGroup, ResolvedModule, ResolvedProduct, ResolvedProject, ResolvedScanner, Rule,
    RuleArtifact, RuleArtifactBinding, ScriptFunction, SourceArtifact, TopLevelProject,
};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    /// Concerns one product, group or rule; handling depends on the error mode.
    #[error("{0}")]
    Entity(ErrorInfo),

    /// Aborts resolution in every mode.
    #[error("{0}")]
    Fatal(ErrorInfo),

    #[error("Project resolving canceled for configuration '{configuration}'.")]
    Canceled { configuration: String },
}

impl ResolverError {
    pub fn entity(description: impl Into<String>, location: CodeLocation) -> Self {
        Self::Entity(ErrorInfo::new(description, location))
    }

    pub fn fatal(description: impl Into<String>, location: CodeLocation) -> Self {
        Self::Fatal(ErrorInfo::new(description, location))
    }

    /// The diagnostic carried by the error.
    pub fn info(&self) -> ErrorInfo {
        match self {
            Self::Entity(info) | Self::Fatal(info) => info.clone(),
            Self::Canceled { .. } => ErrorInfo::message(self.to_string()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Entity(_))
    }

    /// Prepends a headline to the diagnostic, keeping the severity.
    fn with_headline(self, description: String, location: CodeLocation) -> Self {
        match self {
            Self::Entity(mut info) => {
                info.prepend(description, location);
                Self::Entity(info)
            }
            Self::Fatal(mut info) => {
                info.prepend(description, location);
                Self::Fatal(info)
            }
            canceled => canceled,
        }
    }

    /// Appends further diagnostics, e.g. errors the loader deferred.
    fn with_sub_errors(self, errors: &[ErrorInfo]) -> Self {
        match self {
            Self::Entity(mut info) => {
                errors.iter().for_each(|e| info.append_error(e));
                Self::Entity(info)
            }
            Self::Fatal(mut info) => {
                errors.iter().for_each(|e| info.append_error(e));
                Self::Fatal(info)
            }
            canceled => canceled,
        }
    }
}

impl From<EvaluationError> for ResolverError {
    fn from(error: EvaluationError) -> Self {
        Self::Entity(error.into())
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;

// --- Dispatch tables ---

/// What to do with a child item of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemHandler {
    Project,
    SubProject,
    Product,
    Group,
    Rule,
    FileTagger,
    Scanner,
    Ignore,
}

/// Children of a `Project` item.
const PROJECT_CHILD_HANDLERS: &[(ItemType, ItemHandler)] = &[
    (ItemType::Project, ItemHandler::Project),
    (ItemType::SubProject, ItemHandler::SubProject),
    (ItemType::Product, ItemHandler::Product),
    (ItemType::FileTagger, ItemHandler::FileTagger),
    (ItemType::Rule, ItemHandler::Rule),
    (ItemType::Probe, ItemHandler::Ignore),
    (ItemType::PropertyOptions, ItemHandler::Ignore),
];

/// Children of a `Product` item.
const PRODUCT_CHILD_HANDLERS: &[(ItemType, ItemHandler)] = &[
    (ItemType::Depends, ItemHandler::Ignore),
    (ItemType::Rule, ItemHandler::Rule),
    (ItemType::FileTagger, ItemHandler::FileTagger),
    (ItemType::Group, ItemHandler::Group),
    (ItemType::Export, ItemHandler::Ignore),
    (ItemType::Probe, ItemHandler::Ignore),
    (ItemType::PropertyOptions, ItemHandler::Ignore),
    (ItemType::Properties, ItemHandler::Ignore),
];

/// Children of a module instance.
const MODULE_CHILD_HANDLERS: &[(ItemType, ItemHandler)] = &[
    (ItemType::Group, ItemHandler::Ignore),
    (ItemType::Rule, ItemHandler::Rule),
    (ItemType::FileTagger, ItemHandler::FileTagger),
    (ItemType::Scanner, ItemHandler::Scanner),
    (ItemType::Depends, ItemHandler::Ignore),
    (ItemType::Probe, ItemHandler::Ignore),
    (ItemType::PropertyOptions, ItemHandler::Ignore),
    (ItemType::Parameter, ItemHandler::Ignore),
];

fn lookup_handler(table: &[(ItemType, ItemHandler)], item_type: ItemType) -> Option<ItemHandler> {
    table
        .iter()
        .find(|(t, _)| *t == item_type)
        .map(|(_, h)| *h)
}

// --- Contexts ---

/// State of the project currently being resolved.
struct ProjectContext {
    project: ProjectId,
    /// Rules and taggers declared at project level, copied into every direct product.
    rules: Vec<Rule>,
    file_taggers: Vec<FileTagger>,
    /// Owner module of rules declared outside any module.
    dummy_module: Arc<ResolvedModule>,
}

impl ProjectContext {
    fn new(project: ProjectId) -> Self {
        Self {
            project,
            rules: Vec::new(),
            file_taggers: Vec::new(),
            dummy_module: Arc::new(ResolvedModule::default()),
        }
    }
}

/// State of the product currently being resolved.
struct ProductContext {
    product: ProductId,
    item: ItemId,
    /// First location at which each `(targetOfModule, path)` was listed.
    source_artifact_locations: HashMap<(String, String), CodeLocation>,
    artifact_properties_per_filter: BTreeMap<FileTags, CodeLocation>,
    additional_file_tags: FileTags,
}

/// What a nested group inherits from its enclosing group.
struct GroupContext {
    enabled: bool,
    prefix: String,
    file_tags: FileTags,
    properties: Arc<PropertyMap>,
}

// --- Resolver ---

pub struct ProjectResolver<'a> {
    evaluator: &'a mut dyn Evaluator,
    load_result: ModuleLoaderResult,
    setup: SetupProjectParameters,
    cancellation: Option<CancellationToken>,
    top: TopLevelProject,
    product_context: Option<ProductContext>,
    module_context: Option<Arc<ResolvedModule>>,
    file_contexts: HashMap<String, Arc<ResolvedFileContext>>,
    evaluation_cache: Option<HashMap<(ItemId, String), Option<Variant>>>,
    product_items: BTreeMap<ProductId, ItemId>,
    index: ProductIndex,
    queued_errors: Vec<ResolverError>,
    delayed_errors: Vec<ErrorInfo>,
}

impl<'a> ProjectResolver<'a> {
    pub fn new(
        evaluator: &'a mut dyn Evaluator,
        load_result: ModuleLoaderResult,
        setup: SetupProjectParameters,
    ) -> Self {
        Self {
            evaluator,
            load_result,
            setup,
            cancellation: None,
            top: TopLevelProject::default(),
            product_context: None,
            module_context: None,
            file_contexts: HashMap::new(),
            evaluation_cache: None,
            product_items: BTreeMap::new(),
            index: ProductIndex::default(),
            queued_errors: Vec::new(),
            delayed_errors: Vec::new(),
        }
    }

    /// Polls `token` at the start of every project, product, module and rule.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Resolves the whole tree.
    ///
    /// # Errors
    /// Returns the first fatal error, the collected product errors in strict
    /// mode, or [`ResolverError::Canceled`]. Errors the loader deferred for
    /// disabled products are attached to whatever error ends resolution.
    pub fn resolve(mut self) -> ResolverResult<TopLevelProject> {
        let start = FileTime::now();
        let root = self
            .load_result
            .root
            .ok_or_else(|| ResolverError::Fatal(ErrorInfo::message("No project item to resolve.")))?;
        let root_item = &self.load_result.item_pool[root];
        if root_item.item_type != ItemType::Project {
            return Err(ResolverError::fatal(
                format!(
                    "The top-level item must be of type 'Project', not '{}'.",
                    root_item.item_type
                ),
                root_item.location.clone(),
            ));
        }
        debug!("Resolving project '{}'.", root_item.file_path());

        if let Err(error) = self.resolve_top_level_project(root) {
            return Err(error.with_sub_errors(&self.delayed_errors));
        }
        self.top.last_start_resolve_time = start;
        self.top.last_end_resolve_time = FileTime::now();
        Ok(self.top)
    }

    // --- Helpers ---

    fn check_cancelation(&self) -> ResolverResult<()> {
        match &self.cancellation {
            Some(token) if token.load(Ordering::SeqCst) => Err(ResolverError::Canceled {
                configuration: TopLevelProject::derive_id(&self.setup.build_configuration),
            }),
            _ => Ok(()),
        }
    }

    fn is_relaxed(&self) -> bool {
        self.setup.product_error_mode == ErrorHandlingMode::Relaxed
    }

    fn record_warning(&mut self, warning: ErrorInfo) {
        warn!("{}", warning);
        self.top.warnings.push(warning);
    }

    fn item(&self, id: ItemId) -> &Item {
        &self.load_result.item_pool[id]
    }

    fn current_product(&self) -> Option<ProductId> {
        self.product_context.as_ref().map(|c| c.product)
    }

    fn bool_value(&mut self, item: ItemId, name: &str, default: bool) -> ResolverResult<bool> {
        Ok(self
            .evaluator
            .bool_value(&self.load_result.item_pool, item, name, default)?)
    }

    fn string_value(&mut self, item: ItemId, name: &str) -> ResolverResult<String> {
        Ok(self
            .evaluator
            .string_value(&self.load_result.item_pool, item, name)?)
    }

    fn string_list_value(&mut self, item: ItemId, name: &str) -> ResolverResult<Vec<String>> {
        Ok(self
            .evaluator
            .string_list_value(&self.load_result.item_pool, item, name)?)
    }

    fn file_tags_value(&mut self, item: ItemId, name: &str) -> ResolverResult<Option<FileTags>> {
        Ok(self
            .evaluator
            .file_tags_value(&self.load_result.item_pool, item, name)?)
    }

    /// Evaluates through the snapshot cache when one is active.
    fn cached_value(&mut self, item: ItemId, name: &str) -> ResolverResult<Option<Variant>> {
        let key = (item, name.to_string());
        if let Some(hit) = self.evaluation_cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok(hit.clone());
        }
        let value = self.evaluator.value(&self.load_result.item_pool, item, name)?;
        if let Some(cache) = self.evaluation_cache.as_mut() {
            cache.insert(key, value.clone());
        }
        Ok(value)
    }

    /// Looks a property up along the prototype chain without evaluating it.
    fn raw_property(&self, item: ItemId, name: &str) -> Option<Value> {
        self.load_result
            .item_pool
            .prototype_chain(item)
            .find_map(|i| i.property(name))
            .cloned()
    }

    fn resolved_file_context(&mut self, item: ItemId) -> Option<Arc<ResolvedFileContext>> {
        let file = self.item(item).file.clone()?;
        let context = self
            .file_contexts
            .entry(file.file_path.clone())
            .or_insert_with(|| {
                Arc::new(ResolvedFileContext {
                    file_path: file.file_path.clone(),
                    search_paths: file.search_paths.clone(),
                    js_imports: file.js_imports.clone(),
                    js_extensions: file.js_extensions.clone(),
                })
            });
        Some(Arc::clone(context))
    }

    fn script_function_value(&mut self, item: ItemId, name: &str) -> ScriptFunction {
        let Some(Value::JsSource(value)) = self.raw_property(item, name) else {
            return ScriptFunction::default();
        };
        let argument_names = self
            .load_result
            .item_pool
            .property_declaration(item, name)
            .map(|d| d.function_argument_names.clone())
            .unwrap_or_default();
        ScriptFunction {
            source_code: source_code_as_function(&value, &argument_names),
            location: value.location.clone(),
            file_context: self.resolved_file_context(item),
        }
    }

    fn dispatch_children(
        &mut self,
        table: &[(ItemType, ItemHandler)],
        children: &[ItemId],
        project: &mut ProjectContext,
    ) -> ResolverResult<()> {
        for &child in children {
            self.call_item_function(table, child, project)?;
        }
        Ok(())
    }

    fn call_item_function(
        &mut self,
        table: &[(ItemType, ItemHandler)],
        item: ItemId,
        project: &mut ProjectContext,
    ) -> ResolverResult<()> {
        let item_type = self.item(item).item_type;
        let Some(handler) = lookup_handler(table, item_type) else {
            debug!("Ignoring item of type '{}' at {}.", item_type, self.item(item).location);
            return Ok(());
        };
        match handler {
            ItemHandler::Project => {
                let mut sub = self.create_project_context(project.project);
                self.resolve_project(item, &mut sub)
            }
            ItemHandler::SubProject => self.resolve_sub_project(item, project),
            ItemHandler::Product => self.resolve_product(item, project),
            ItemHandler::Group => self.resolve_group(item, None),
            ItemHandler::Rule => self.resolve_rule(item, project),
            ItemHandler::FileTagger => self.resolve_file_tagger(item, project),
            ItemHandler::Scanner => self.resolve_scanner(item, project),
            ItemHandler::Ignore => Ok(()),
        }
    }

    // --- Projects ---

    fn resolve_top_level_project(&mut self, root: ItemId) -> ResolverResult<()> {
        self.top.set_build_configuration(self.setup.build_configuration.clone());
        self.top.build_directory =
            TopLevelProject::derive_build_directory(&self.setup.build_root, &self.top.id);
        self.top.projects.push(ResolvedProject {
            enabled: true,
            ..ResolvedProject::default()
        });
        let mut context = ProjectContext::new(TopLevelProject::ROOT);
        self.resolve_project(root, &mut context)?;

        let mut queued = std::mem::take(&mut self.queued_errors);
        if queued.len() == 1 {
            if let Some(error) = queued.pop() {
                return Err(error);
            }
        } else if !queued.is_empty() {
            let mut combined = ErrorInfo::default();
            queued.iter().for_each(|e| combined.append_error(&e.info()));
            return Err(ResolverError::Fatal(combined));
        }

        self.top.overridden_values = self.setup.overridden_values.clone();
        self.top.environment = self.evaluator.environment();
        self.top.used_environment = self.evaluator.used_environment();
        let fs_results = self.evaluator.file_system_results();
        self.top.canonical_file_path_results = fs_results.canonical_file_path_results;
        self.top.file_exists_results = fs_results.file_exists_results;
        self.top.directory_entries_results = fs_results.directory_entries_results;
        self.top.file_last_modified_results = fs_results.file_last_modified_results;
        self.top.build_system_files = self.load_result.qbs_files.clone();
        self.top.probes = self.load_result.project_probes.clone();
        self.top.profile_configs = self.load_result.profile_configs.clone();

        make_sub_project_names_unique(&mut self.top, TopLevelProject::ROOT);
        self.check_for_duplicate_product_names()?;

        let mut used_products = BTreeMap::new();
        for (&product, item) in &self.product_items {
            let deps: Vec<ProductDependency> = self
                .load_result
                .product_infos
                .get(item)
                .map(|info| info.used_products.clone())
                .unwrap_or_default();
            used_products.insert(product, deps);
        }
        let warnings = product_dependencies::resolve_product_dependencies(
            &mut self.top,
            &self.index,
            &used_products,
            self.setup.product_error_mode,
        )?;
        for warning in warnings {
            self.record_warning(warning);
        }

        for product in self.top.all_products(TopLevelProject::ROOT) {
            if self.top[product].enabled {
                finalize_product_files(&mut self.top[product]);
            }
        }
        Ok(())
    }

    fn create_project_context(&mut self, parent: ProjectId) -> ProjectContext {
        let id = ProjectId(self.top.projects.len());
        self.top.projects.push(ResolvedProject {
            enabled: true,
            parent_project: Some(parent),
            ..ResolvedProject::default()
        });
        self.top[parent].sub_projects.push(id);
        ProjectContext::new(id)
    }

    fn resolve_project(&mut self, item: ItemId, context: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        let id = context.project;
        let location = self.item(item).location.clone();
        let mut name = self.string_value(item, NAME_PROPERTY)?;
        if name.is_empty() {
            name = paths::complete_base_name(&location.file_path).to_string();
        }
        let enabled = self.bool_value(item, CONDITION_PROPERTY, true)?;
        debug!("Resolving project '{}' (enabled: {}).", name, enabled);
        {
            let project = &mut self.top[id];
            project.name = name;
            project.location = location;
            project.enabled = enabled;
        }

        let mut properties = VariantMap::new();
        if !enabled {
            let profile = self.string_value(item, PROFILE_PROPERTY)?;
            properties.insert(PROFILE_PROPERTY.to_string(), Variant::from(profile));
            self.top[id].project_properties = properties;
            return Ok(());
        }

        let mut declared: BTreeSet<String> = BTreeSet::new();
        for proto in self.load_result.item_pool.prototype_chain(item) {
            for (key, decl) in &proto.property_declarations {
                if decl.available_in_config {
                    declared.insert(key.clone());
                }
            }
        }
        for key in declared {
            if matches!(self.raw_property(item, &key), Some(Value::Item(_))) {
                continue;
            }
            let value = self.evaluator.value(&self.load_result.item_pool, item, &key)?;
            properties.insert(key, value.unwrap_or_default());
        }
        self.top[id].project_properties = properties;

        let children = self.item(item).children.clone();
        for child in children {
            match self.call_item_function(PROJECT_CHILD_HANDLERS, child, context) {
                Ok(()) => {}
                Err(canceled @ ResolverError::Canceled { .. }) => return Err(canceled),
                Err(error) => self.queued_errors.push(error),
            }
        }

        let products = self.top[id].products.clone();
        for product in products {
            let product = &mut self.top[product];
            product.file_taggers.extend(context.file_taggers.iter().cloned());
            product.rules.extend(context.rules.iter().cloned());
        }
        Ok(())
    }

    fn resolve_sub_project(&mut self, item: ItemId, context: &mut ProjectContext) -> ResolverResult<()> {
        let mut sub = self.create_project_context(context.project);
        let pool = &self.load_result.item_pool;
        if let Some(project_item) = pool.child_of_type(item, ItemType::Project) {
            return self.resolve_project(project_item, &mut sub);
        }

        // The loader only leaves out the Project item for disabled sub-projects.
        let location = self.item(item).location.clone();
        let properties = pool.child_of_type(item, ItemType::PropertiesInSubProject);
        let name = match properties {
            Some(p) => self.string_value(p, NAME_PROPERTY)?,
            None => String::new(),
        };
        debug!("Sub-project '{}' at {} is disabled.", name, location);
        let project = &mut self.top[sub.project];
        project.enabled = false;
        project.name = name;
        project.location = location;
        Ok(())
    }

    // --- Products ---

    fn resolve_product(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        let id = ProductId(self.top.products.len());
        let location = self.item(item).location.clone();
        self.top
            .products
            .push(ResolvedProduct::new(location.clone(), project.project));
        self.product_items.insert(id, item);
        self.product_context = Some(ProductContext {
            product: id,
            item,
            source_artifact_locations: HashMap::new(),
            artifact_properties_per_filter: BTreeMap::new(),
            additional_file_tags: FileTags::new(),
        });
        self.evaluator.clear_property_dependencies();

        let result = self.resolve_product_fully(id, item, project);
        self.product_context = None;
        self.module_context = None;
        self.evaluation_cache = None;

        let outcome = match result {
            Ok(()) => Ok(()),
            Err(canceled @ ResolverError::Canceled { .. }) => Err(canceled),
            Err(error) => {
                let name = self.top[id].name.clone();
                let headline = if name.is_empty() {
                    "Error while handling product:".to_string()
                } else {
                    format!("Error while handling product '{}':", name)
                };
                let error = error.with_headline(headline, location.clone());
                if !self.top[id].enabled && !error.is_fatal() {
                    debug!("{}", error);
                    Ok(())
                } else if error.is_fatal() || !self.is_relaxed() {
                    Err(error)
                } else {
                    // Reported again if resolution fails later on.
                    if let Some(delayed) = self
                        .load_result
                        .product_infos
                        .get(&item)
                        .and_then(|info| info.delayed_error.clone())
                    {
                        self.delayed_errors.push(delayed);
                    }
                    self.record_warning(error.info());
                    self.record_warning(ErrorInfo::new(
                        format!("Product '{}' had errors and was disabled.", name),
                        location,
                    ));
                    self.top[id].enabled = false;
                    Ok(())
                }
            }
        };

        // The product takes part in name checks and dependency lookups even
        // when it ended up disabled.
        self.top[project.project].products.push(id);
        let product = &self.top[id];
        self.index.register(id, &product.name, &product.file_tags);
        outcome
    }

    fn resolve_product_fully(
        &mut self,
        id: ProductId,
        item: ItemId,
        project: &mut ProjectContext,
    ) -> ResolverResult<()> {
        let location = self.item(item).location.clone();

        let name = self.string_value(item, NAME_PROPERTY)?;
        self.top[id].name = name.clone();
        let mut build_directory = self.string_value(item, BUILD_DIRECTORY_PROPERTY)?;
        let mut profile = self.string_value(item, PROFILE_PROPERTY)?;
        if profile.is_empty() {
            profile = self.setup.top_level_profile.clone();
        }
        if profile.is_empty() {
            profile = self.top.profile();
        }
        if profile.is_empty() {
            return Err(ResolverError::fatal(
                format!("Product '{}' has no profile.", name),
                location,
            ));
        }
        let multiplex_id = self.string_value(item, MULTIPLEX_CONFIGURATION_ID_PROPERTY)?;
        {
            let product = &mut self.top[id];
            product.profile = profile;
            product.multiplex_configuration_id = multiplex_id.clone();
        }
        debug!(
            "Resolving product '{}'.",
            ResolvedProduct::unique_name_of(&name, &multiplex_id)
        );

        if self
            .item(item)
            .modules
            .iter()
            .any(|m| m.name.len() == 1 && m.name.first() == Some(&name))
        {
            return Err(ResolverError::entity(
                format!("The product name '{}' collides with a module name.", name),
                location,
            ));
        }

        let enabled = self.bool_value(item, CONDITION_PROPERTY, true)?;
        self.top[id].enabled = enabled;
        let info = self.load_result.product_infos.get(&item).cloned().unwrap_or_default();
        if let Some(delayed) = info.delayed_error {
            if enabled {
                return Err(ResolverError::Entity(delayed));
            }
            debug!("Ignoring deferred error of disabled product '{}': {}", name, delayed);
        }

        if build_directory.is_empty() {
            build_directory = format!(
                "{}/{}",
                self.top.build_directory,
                ResolvedProduct::derive_build_directory_name(&name, &multiplex_id)
            );
        }
        let file_tags = self.file_tags_value(item, TYPE_PROPERTY)?.unwrap_or_default();
        let target_name = self.string_value(item, TARGET_NAME_PROPERTY)?;
        let mut source_directory = self.string_value(item, SOURCE_DIRECTORY_PROPERTY)?;
        if source_directory.is_empty() {
            source_directory = paths::parent_dir(self.item(item).file_path());
        }
        let destination_directory = match self.string_value(item, DESTINATION_DIRECTORY_PROPERTY)? {
            dir if dir.is_empty() => build_directory.clone(),
            dir => paths::resolve_path(&self.top.build_directory, &dir),
        };
        {
            let product = &mut self.top[id];
            product.file_tags = file_tags;
            product.target_name = target_name;
            product.source_directory = source_directory;
            product.destination_directory = destination_directory.clone();
            product.probes = info.probes.clone();
        }

        let (mut product_properties, module_values) = self.create_product_config(item)?;
        product_properties.insert(
            DESTINATION_DIRECTORY_PROPERTY.to_string(),
            Variant::from(destination_directory),
        );
        product_properties
            .entry(BUILD_DIRECTORY_PROPERTY.to_string())
            .or_insert_with(|| Variant::from(build_directory));
        {
            let product = &mut self.top[id];
            product.product_properties = product_properties;
            product.module_properties = PropertyMap::shared(module_values);
        }

        let mut children = self.item(item).children.clone();
        if let Some(files) = self.raw_property(item, FILES_PROPERTY) {
            let fake_group = self.create_fake_group(item, &name, files);
            children.insert(0, fake_group);
        }
        self.dispatch_children(PRODUCT_CHILD_HANDLERS, &children, project)?;

        self.resolve_modules(item, project)?;
        let additional = self
            .product_context
            .as_mut()
            .map(|c| std::mem::take(&mut c.additional_file_tags))
            .unwrap_or_default();
        self.top[id].file_tags.extend(additional);
        Ok(())
    }

    /// Wraps a product's own `files` into a group, so files have one code path.
    fn create_fake_group(&mut self, product_item: ItemId, name: &str, files: Value) -> ItemId {
        let product = self.item(product_item);
        let mut group = Item::new(ItemType::Group, product.location.clone());
        group.file = product.file.clone();
        group.scope = Some(product_item);
        group.set_property(NAME_PROPERTY, Value::Variant(Variant::from(name)));
        group.set_property(FILES_PROPERTY, files);
        if let Some(excludes) = self.raw_property(product_item, EXCLUDE_FILES_PROPERTY) {
            group.set_property(EXCLUDE_FILES_PROPERTY, excludes);
        }
        group.set_property(OVERRIDE_TAGS_PROPERTY, Value::Variant(Variant::Bool(false)));
        self.load_result.item_pool.add(group)
    }

    /// Evaluates the product's own properties and all of its modules' properties.
    fn create_product_config(&mut self, item: ItemId) -> ResolverResult<(VariantMap, VariantMap)> {
        self.evaluation_cache = Some(HashMap::new());
        let result = self.evaluate_product_config(item);
        self.evaluation_cache = None;
        result
    }

    fn evaluate_product_config(&mut self, item: ItemId) -> ResolverResult<(VariantMap, VariantMap)> {
        let module_values = self.evaluate_module_values(item)?;
        let product_properties = self.evaluate_properties(item, item, VariantMap::new(), true)?;
        Ok((product_properties, module_values))
    }

    /// `module name -> properties` for every module reachable from `item`.
    fn evaluate_module_values(&mut self, item: ItemId) -> ResolverResult<VariantMap> {
        let mut result = VariantMap::new();
        let mut queue: VecDeque<ItemModule> = self.item(item).modules.iter().cloned().collect();
        let mut seen: HashSet<QualifiedId> = HashSet::new();
        while let Some(module) = queue.pop_front() {
            if !seen.insert(module.name.clone()) {
                continue;
            }
            let values = self.evaluate_properties(module.item, module.item, VariantMap::new(), true)?;
            result.insert(qualified_name(&module.name), Variant::Map(values));
            queue.extend(self.item(module.item).modules.iter().cloned());
        }
        Ok(result)
    }

    /// Evaluates every property of `container` (and, optionally, of its
    /// prototypes) in the context of `item`. Entries already in `result` win.
    fn evaluate_properties(
        &mut self,
        item: ItemId,
        container: ItemId,
        mut result: VariantMap,
        lookup_prototype: bool,
    ) -> ResolverResult<VariantMap> {
        let properties: Vec<(String, Value)> = self
            .item(container)
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in properties {
            self.check_cancelation()?;
            match value {
                // Module instances are handled by `evaluate_module_values`.
                Value::Item(_) => {}
                Value::JsSource(source) => {
                    if result.contains_key(&name) {
                        continue;
                    }
                    let declaration = self.load_result.item_pool.property_declaration(item, &name);
                    let property_type = declaration.map_or(PropertyType::Variant, |d| d.property_type);
                    let available = declaration.is_none_or(|d| d.available_in_config);
                    if property_type == PropertyType::Verbatim || !available {
                        continue;
                    }
                    let value = self.cached_value(item, &name).map_err(|e| match e {
                        ResolverError::Entity(info) if !info.items().iter().any(|i| i.location.is_valid()) => {
                            ResolverError::Entity(ErrorInfo::new(info.to_string(), source.location.clone()))
                        }
                        other => other,
                    })?;
                    let value = value.unwrap_or_default();
                    let value = match property_type {
                        PropertyType::Path => self.convert_path_property(&value.to_string_value()),
                        PropertyType::PathList => Variant::List(
                            value
                                .to_string_list()
                                .iter()
                                .map(|p| self.convert_path_property(p))
                                .collect(),
                        ),
                        PropertyType::StringList => Variant::from(value.to_string_list()),
                        _ => value,
                    };
                    result.insert(name, value);
                }
                Value::Variant(v) => {
                    result.entry(name).or_insert(v);
                }
            }
        }
        match self.item(container).prototype {
            Some(prototype) if lookup_prototype => self.evaluate_properties(item, prototype, result, true),
            _ => Ok(result),
        }
    }

    fn convert_path_property(&self, path: &str) -> Variant {
        if path.is_empty() {
            return Variant::from(path);
        }
        let base = self
            .current_product()
            .map(|p| self.top[p].source_directory.clone())
            .unwrap_or_default();
        Variant::from(paths::resolve_path(&base, path))
    }

    // --- Modules ---

    /// Resolves the product's modules breadth-first, each name once.
    ///
    /// Breadth-first matters: a product may set properties on a module that
    /// deeper modules read, and shallower instances must be seen first.
    fn resolve_modules(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        let mut queue: VecDeque<ItemModule> = self.item(item).modules.iter().cloned().collect();
        let mut seen: HashSet<QualifiedId> = HashSet::new();
        while let Some(module) = queue.pop_front() {
            if !seen.insert(module.name.clone()) {
                continue;
            }
            self.resolve_module(&module, project)?;
            queue.extend(self.item(module.item).modules.iter().cloned());
        }
        if let Some(product) = self.current_product() {
            self.top[product].modules.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(())
    }

    fn resolve_module(&mut self, module: &ItemModule, project: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        let item = module.item;
        if !self.bool_value(item, PRESENT_PROPERTY, true)? {
            return Ok(());
        }
        let name = qualified_name(&module.name);
        trace!("Resolving module '{}'.", name);

        let additional = self.file_tags_value(item, ADDITIONAL_PRODUCT_TYPES_PROPERTY)?;
        if let (Some(ctx), Some(tags)) = (self.product_context.as_mut(), additional) {
            ctx.additional_file_tags.extend(tags);
        }

        let mut module_dependencies = Vec::new();
        for dependency in self.item(item).modules.clone() {
            if self.bool_value(dependency.item, PRESENT_PROPERTY, true)? {
                module_dependencies.push(qualified_name(&dependency.name));
            }
        }
        let resolved = Arc::new(ResolvedModule {
            name: name.clone(),
            module_dependencies,
            setup_build_environment_script: self
                .script_function_value(item, SETUP_BUILD_ENVIRONMENT_PROPERTY),
            setup_run_environment_script: self.script_function_value(item, SETUP_RUN_ENVIRONMENT_PROPERTY),
            is_product: module.is_product,
            product: self.current_product(),
        });
        if let Some(product) = self.current_product() {
            let product = &mut self.top[product];
            product.modules.push(Arc::clone(&resolved));
            if !module.parameters.is_empty() {
                product
                    .module_parameters
                    .insert(name, module.parameters.clone());
            }
        }

        let previous = self.module_context.replace(resolved);
        let children = self.item(item).children.clone();
        let result = self.dispatch_children(MODULE_CHILD_HANDLERS, &children, project);
        self.module_context = previous;
        result
    }

    // --- Groups ---

    fn resolve_group(&mut self, item: ItemId, parent: Option<&GroupContext>) -> ResolverResult<()> {
        self.check_cancelation()?;
        let Some(product) = self.current_product() else {
            return Ok(());
        };
        let parent_enabled = parent.map_or(self.top[product].enabled, |p| p.enabled);
        let enabled = parent_enabled && self.bool_value(item, CONDITION_PROPERTY, true)?;
        let known_files = self
            .product_context
            .as_ref()
            .map(|c| c.source_artifact_locations.clone());
        match self.resolve_group_fully(item, parent, enabled) {
            Ok(()) => Ok(()),
            Err(canceled @ ResolverError::Canceled { .. }) => Err(canceled),
            Err(error) if !enabled => {
                debug!(
                    "Ignoring error in disabled group at {}: {}",
                    self.item(item).location,
                    error
                );
                Ok(())
            }
            Err(error) if error.is_fatal() || !self.is_relaxed() => Err(error),
            Err(error) => {
                // The group was dropped, so its files must not count as duplicates later.
                if let (Some(ctx), Some(known)) = (self.product_context.as_mut(), known_files) {
                    ctx.source_artifact_locations = known;
                }
                self.record_warning(error.info());
                Ok(())
            }
        }
    }

    fn resolve_group_fully(
        &mut self,
        item: ItemId,
        parent: Option<&GroupContext>,
        enabled: bool,
    ) -> ResolverResult<()> {
        let Some(product) = self.current_product() else {
            return Ok(());
        };
        let location = self.item(item).location.clone();
        let parent_properties = parent.map_or_else(
            || Arc::clone(&self.top[product].module_properties),
            |p| Arc::clone(&p.properties),
        );
        let properties = self.group_property_map(item, parent_properties)?;

        let files = self.string_list_value(item, FILES_PROPERTY)?;
        let file_tags_filter = self.string_list_value(item, FILE_TAGS_FILTER_PROPERTY)?;
        if !file_tags_filter.is_empty() {
            if !files.is_empty() {
                return Err(ResolverError::entity(
                    "Group.files and Group.fileTagsFilters are exclusive.",
                    location,
                ));
            }
            return self.resolve_artifact_properties(item, file_tags_filter, properties, enabled);
        }

        let prefix = match self.evaluator.optional_string_value(
            &self.load_result.item_pool,
            item,
            PREFIX_PROPERTY,
        )? {
            Some(prefix) => prefix,
            None => parent.map(|p| p.prefix.clone()).unwrap_or_default(),
        };
        let (patterns, literals): (Vec<String>, Vec<String>) =
            files.into_iter().partition(|f| paths::is_pattern(f));
        let literals: Vec<String> = literals.into_iter().map(|f| format!("{}{}", prefix, f)).collect();

        let declared_tags = self.file_tags_value(item, FILE_TAGS_PROPERTY)?;
        let override_tags = self.bool_value(item, OVERRIDE_TAGS_PROPERTY, true)?;
        let file_tags = match declared_tags {
            Some(tags) if override_tags => {
                if tags.is_empty() {
                    FileTags::from([UNKNOWN_FILE_TAG.to_string()])
                } else {
                    tags
                }
            }
            declared => {
                let mut tags = declared.unwrap_or_default();
                if let Some(parent) = parent {
                    tags.extend(parent.file_tags.iter().cloned());
                }
                tags
            }
        };
        let target_of_module = self.string_value(item, MODULE_PROPERTY_INTERNAL)?;
        let files_location = match self.raw_property(item, FILES_PROPERTY) {
            Some(Value::JsSource(source)) if source.location.is_valid() => source.location,
            _ => location.clone(),
        };

        let mut group = ResolvedGroup {
            name: String::new(),
            enabled,
            location: location.clone(),
            prefix: prefix.clone(),
            files: Vec::new(),
            wildcards: None,
            properties: Arc::clone(&properties),
            file_tags: file_tags.clone(),
            override_tags,
            target_of_module: target_of_module.clone(),
        };
        let template = SourceArtifact {
            absolute_file_path: String::new(),
            file_tags: file_tags.clone(),
            override_file_tags: override_tags,
            target_of_module,
            properties: Arc::clone(&properties),
        };
        let mut file_error = ErrorInfo::default();

        if !patterns.is_empty() {
            let excludes = self.string_list_value(item, EXCLUDE_FILES_PROPERTY)?;
            let mut wildcards = SourceWildCards::new(prefix.clone(), patterns, excludes);
            let base_dir = paths::parent_dir(self.item(item).file_path());
            let expanded = wildcards
                .expand_patterns(&base_dir, &self.top.build_directory)
                .map_err(|e| ResolverError::entity(e.to_string(), files_location.clone()))?;
            for file in expanded {
                if let Some(artifact) =
                    self.create_source_artifact(&template, &file, true, enabled, &files_location, &mut file_error)?
                {
                    wildcards.files.push(artifact);
                }
            }
            group.wildcards = Some(wildcards);
        }
        for file in &literals {
            if let Some(artifact) =
                self.create_source_artifact(&template, file, false, enabled, &files_location, &mut file_error)?
            {
                group.files.push(artifact);
            }
        }
        if file_error.has_error() {
            if !self.is_relaxed() {
                return Err(ResolverError::Entity(file_error));
            }
            self.record_warning(file_error);
        }

        group.name = self.string_value(item, NAME_PROPERTY)?;
        if group.name.is_empty() {
            group.name = format!("Group {}", self.top[product].groups.len());
        }
        debug!(
            "Group '{}' with {} file(s), tags {:?}.",
            group.name,
            group.all_files().count(),
            group.file_tags
        );
        self.top[product].groups.push(group);

        let context = GroupContext {
            enabled,
            prefix,
            file_tags,
            properties,
        };
        let children = self.item(item).children.clone();
        for child in children {
            if self.item(child).item_type == ItemType::Group {
                self.resolve_group(child, Some(&context))?;
            }
        }
        Ok(())
    }

    fn create_source_artifact(
        &mut self,
        template: &SourceArtifact,
        file_name: &str,
        from_wildcard: bool,
        group_enabled: bool,
        files_location: &CodeLocation,
        file_error: &mut ErrorInfo,
    ) -> ResolverResult<Option<SourceArtifact>> {
        let Some(product) = self.current_product() else {
            return Ok(None);
        };
        let absolute = paths::resolve_path(&self.top[product].source_directory, file_name);

        if !from_wildcard && !Path::new(&absolute).exists() {
            if group_enabled {
                file_error.append(format!("File '{}' does not exist.", absolute), files_location.clone());
            } else {
                debug!("File '{}' of a disabled group does not exist.", absolute);
            }
            self.top[product].missing_source_files.insert(absolute);
            return Ok(None);
        }

        if group_enabled {
            if let Some(ctx) = self.product_context.as_mut() {
                let key = (template.target_of_module.clone(), absolute.clone());
                if let Some(first) = ctx.source_artifact_locations.get(&key) {
                    let mut error = ErrorInfo::message(format!("Duplicate source file '{}'.", absolute));
                    error.append("First occurrence is here.", first.clone());
                    error.append("Next occurrence is here.", files_location.clone());
                    return Err(ResolverError::Fatal(error));
                }
                ctx.source_artifact_locations.insert(key, files_location.clone());
            }
        }

        Ok(Some(SourceArtifact {
            absolute_file_path: absolute,
            ..template.clone()
        }))
    }

    /// Handles a group with a `fileTagsFilter`: it overrides properties of
    /// matching artifacts instead of contributing files.
    fn resolve_artifact_properties(
        &mut self,
        item: ItemId,
        filter: Vec<String>,
        properties: Arc<PropertyMap>,
        enabled: bool,
    ) -> ResolverResult<()> {
        let Some(product) = self.current_product() else {
            return Ok(());
        };
        let location = self.item(item).location.clone();
        let filter: FileTags = filter.into_iter().collect();
        let previous = self
            .product_context
            .as_ref()
            .and_then(|c| c.artifact_properties_per_filter.get(&filter).cloned());
        if let Some(previous) = previous {
            if previous.file_path == location.file_path {
                let mut error = ErrorInfo::message("Conflicting fileTagsFilter in Group items.");
                error.append("First item", previous);
                error.append("Second item", location);
                return Err(ResolverError::Entity(error));
            }
            // A derived file replaces what a base file declared for the same filter.
            self.top[product]
                .artifact_properties
                .retain(|ap| ap.file_tags_filter != filter);
        }
        if !enabled {
            return Ok(());
        }
        let extra_file_tags = self.file_tags_value(item, FILE_TAGS_PROPERTY)?.unwrap_or_default();
        self.top[product].artifact_properties.push(ArtifactProperties {
            file_tags_filter: filter.clone(),
            property_map: properties,
            extra_file_tags,
        });
        if let Some(ctx) = self.product_context.as_mut() {
            ctx.artifact_properties_per_filter.insert(filter, location);
        }
        Ok(())
    }

    /// The property map of a group: the parent's map, or a fresh one if the
    /// group sets module properties that change any value.
    fn group_property_map(
        &mut self,
        item: ItemId,
        parent: Arc<PropertyMap>,
    ) -> ResolverResult<Arc<PropertyMap>> {
        let set_in_group = self
            .product_context
            .as_ref()
            .and_then(|c| self.load_result.product_infos.get(&c.item))
            .and_then(|info| info.module_properties_set_in_groups.get(&item))
            .cloned()
            .unwrap_or_else(|| self.module_properties_bound_in(item));
        if set_in_group.is_empty() {
            return Ok(parent);
        }
        self.evaluation_cache = Some(HashMap::new());
        let result = self.resolve_additional_module_properties(item, &parent, set_in_group);
        self.evaluation_cache = None;
        Ok(result?.unwrap_or(parent))
    }

    /// Module properties bound directly in a group's module instances.
    fn module_properties_bound_in(&self, item: ItemId) -> BTreeSet<QualifiedId> {
        let mut result = BTreeSet::new();
        for module in &self.item(item).modules {
            for (key, value) in &self.item(module.item).properties {
                if matches!(value, Value::JsSource(_) | Value::Variant(_)) {
                    let mut id = module.name.clone();
                    id.push(key.clone());
                    result.insert(id);
                }
            }
        }
        result
    }

    /// Re-evaluates the modules touched by `set_in_group`, plus everything
    /// depending on those properties. Returns `None` if no value changed.
    fn resolve_additional_module_properties(
        &mut self,
        item: ItemId,
        parent: &PropertyMap,
        set_in_group: BTreeSet<QualifiedId>,
    ) -> ResolverResult<Option<Arc<PropertyMap>>> {
        let dependencies = self.evaluator.property_dependencies();
        let to_evaluate = property_map::properties_to_evaluate(set_in_group, &dependencies);
        let per_module = property_map::group_by_module(&to_evaluate);

        let mut value = parent.value().clone();
        let mut changed = false;
        for (module_name, properties) in per_module {
            let instance = self
                .item(item)
                .modules
                .iter()
                .find(|m| qualified_name(&m.name) == module_name)
                .map(|m| m.item);
            let Some(instance) = instance else {
                continue;
            };
            let mut reusable = parent.module_values(&module_name).cloned().unwrap_or_default();
            reusable.retain(|key, _| !properties.contains(key));
            let values = self.evaluate_properties(instance, instance, reusable, true)?;
            if parent.module_values(&module_name) != Some(&values) {
                value.insert(module_name, Variant::Map(values));
                changed = true;
            }
        }
        Ok(changed.then(|| PropertyMap::shared(value)))
    }

    // --- Rules ---

    fn resolve_rule(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        if !self.bool_value(item, CONDITION_PROPERTY, true)? {
            return Ok(());
        }
        match self.resolve_rule_fully(item, project) {
            Err(ResolverError::Entity(error)) if self.is_relaxed() => {
                debug!("Rule at {} was disabled.", self.item(item).location);
                self.record_warning(error);
                Ok(())
            }
            other => other,
        }
    }

    fn resolve_rule_fully(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        let location = self.item(item).location.clone();
        let mut artifacts = Vec::new();
        for child in self.item(item).children.clone() {
            if self.item(child).item_type != ItemType::Artifact {
                return Err(ResolverError::fatal(
                    "'Rule' can only have children of type 'Artifact'.",
                    self.item(child).location.clone(),
                ));
            }
            artifacts.push(self.resolve_rule_artifact(child)?);
        }

        let name = self.string_value(item, NAME_PROPERTY)?;
        let prepare_script = self.script_function_value(item, PREPARE_PROPERTY);
        let output_artifacts_script = self.script_function_value(item, OUTPUT_ARTIFACTS_PROPERTY);
        if output_artifacts_script.is_valid() && !artifacts.is_empty() {
            return Err(ResolverError::fatal(
                "The Rule.outputArtifacts script is not allowed in rules that contain Artifact items.",
                location,
            ));
        }
        let output_file_tags = self
            .file_tags_value(item, OUTPUT_FILE_TAGS_PROPERTY)?
            .unwrap_or_default();
        if artifacts.is_empty() && output_file_tags.is_empty() {
            return Err(ResolverError::entity(
                "A rule needs to have Artifact items or a non-empty outputFileTags property.",
                location,
            ));
        }

        let multiplex = self.bool_value(item, MULTIPLEX_PROPERTY, false)?;
        let always_run = self.bool_value(item, ALWAYS_RUN_PROPERTY, false)?;
        let inputs = self.file_tags_value(item, INPUTS_PROPERTY)?.unwrap_or_default();
        let inputs_from_dependencies = self
            .file_tags_value(item, INPUTS_FROM_DEPENDENCIES_PROPERTY)?
            .unwrap_or_default();
        let declares_inputs = !inputs.is_empty() || !inputs_from_dependencies.is_empty();
        let requires_inputs = match self
            .evaluator
            .value(&self.load_result.item_pool, item, REQUIRES_INPUTS_PROPERTY)?
        {
            Some(value) => value.to_bool(),
            None => declares_inputs,
        };
        let rule = Rule {
            name,
            prepare_script,
            output_artifacts_script,
            module: self
                .module_context
                .clone()
                .unwrap_or_else(|| Arc::clone(&project.dummy_module)),
            inputs,
            inputs_from_dependencies,
            auxiliary_inputs: self
                .file_tags_value(item, AUXILIARY_INPUTS_PROPERTY)?
                .unwrap_or_default(),
            excluded_auxiliary_inputs: self
                .file_tags_value(item, EXCLUDED_AUXILIARY_INPUTS_PROPERTY)?
                .unwrap_or_default(),
            explicitly_depends_on: self
                .file_tags_value(item, EXPLICITLY_DEPENDS_ON_PROPERTY)?
                .unwrap_or_default(),
            output_file_tags,
            artifacts,
            multiplex,
            requires_inputs,
            always_run,
        };

        if !rule.multiplex && !rule.declares_inputs() {
            return Err(ResolverError::entity(
                "Rule has no inputs, but is not a multiplex rule.",
                location,
            ));
        }
        if !rule.multiplex && !rule.requires_inputs {
            return Err(ResolverError::entity(
                "Rule.requiresInputs is false for non-multiplex rule.",
                location,
            ));
        }
        if !rule.declares_inputs() && rule.requires_inputs {
            return Err(ResolverError::entity(
                "Rule.requiresInputs is true, but the rule does not declare any input tags.",
                location,
            ));
        }

        match self.current_product() {
            Some(product) => self.top[product].rules.push(rule),
            None => project.rules.push(rule),
        }
        Ok(())
    }

    fn resolve_rule_artifact(&mut self, item: ItemId) -> ResolverResult<RuleArtifact> {
        let (file_path, file_path_location) = match self.raw_property(item, FILE_PATH_PROPERTY) {
            Some(Value::JsSource(source)) => (source.source_code_for_evaluation(), source.location),
            _ => (String::new(), CodeLocation::default()),
        };
        let file_tags = self.file_tags_value(item, FILE_TAGS_PROPERTY)?.unwrap_or_default();
        let always_updated = self.bool_value(item, ALWAYS_UPDATED_PROPERTY, true)?;

        let pool = &self.load_result.item_pool;
        let mut seen: HashSet<QualifiedId> = HashSet::new();
        let mut bindings = Vec::new();
        for object in pool.prototype_chain(item) {
            for (key, value) in &object.properties {
                if let Value::Item(nested) = value {
                    collect_artifact_bindings(pool, *nested, vec![key.clone()], &mut seen, &mut bindings);
                }
            }
        }
        Ok(RuleArtifact {
            file_path,
            file_path_location,
            file_tags,
            always_updated,
            location: self.item(item).location.clone(),
            bindings,
        })
    }

    // --- File taggers and scanners ---

    fn resolve_file_tagger(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        if !self.bool_value(item, CONDITION_PROPERTY, true)? {
            return Ok(());
        }
        let location = self.item(item).location.clone();
        let patterns = self.string_list_value(item, PATTERNS_PROPERTY)?;
        if patterns.is_empty() {
            return Err(ResolverError::fatal(
                "FileTagger.patterns must be a non-empty list.",
                location,
            ));
        }
        let file_tags = self.file_tags_value(item, FILE_TAGS_PROPERTY)?.unwrap_or_default();
        if file_tags.is_empty() {
            return Err(ResolverError::fatal("FileTagger.fileTags must not be empty.", location));
        }
        if patterns.iter().any(String::is_empty) {
            return Err(ResolverError::fatal("A FileTagger pattern must not be empty.", location));
        }
        let priority = self
            .evaluator
            .int_value(&self.load_result.item_pool, item, PRIORITY_PROPERTY, 0)?;
        let tagger = FileTagger::new(patterns, file_tags, priority)
            .map_err(|e| ResolverError::fatal(e.to_string(), location))?;
        match self.current_product() {
            Some(product) => self.top[product].file_taggers.push(tagger),
            None => project.file_taggers.push(tagger),
        }
        Ok(())
    }

    fn resolve_scanner(&mut self, item: ItemId, project: &mut ProjectContext) -> ResolverResult<()> {
        self.check_cancelation()?;
        if !self.bool_value(item, CONDITION_PROPERTY, true)? {
            trace!("Scanner condition is false.");
            return Ok(());
        }
        let Some(product) = self.current_product() else {
            return Ok(());
        };
        let scanner = ResolvedScanner {
            module: self
                .module_context
                .clone()
                .unwrap_or_else(|| Arc::clone(&project.dummy_module)),
            inputs: self.file_tags_value(item, INPUTS_PROPERTY)?.unwrap_or_default(),
            recursive: self.bool_value(item, RECURSIVE_PROPERTY, false)?,
            search_paths_script: self.script_function_value(item, SEARCH_PATHS_PROPERTY),
            scan_script: self.script_function_value(item, SCAN_PROPERTY),
        };
        self.top[product].scanners.push(scanner);
        Ok(())
    }

    // --- Cross-product checks ---

    fn check_for_duplicate_product_names(&self) -> ResolverResult<()> {
        let products: Vec<&ResolvedProduct> = self
            .top
            .all_products(TopLevelProject::ROOT)
            .into_iter()
            .map(|p| &self.top[p])
            .filter(|p| p.enabled)
            .collect();
        let mut seen: HashMap<String, &ResolvedProduct> = HashMap::new();
        for product in products {
            let unique_name = product.unique_name();
            if let Some(first) = seen.get(&unique_name) {
                let mut error = ErrorInfo::message(format!("Duplicate product name '{}'.", product.name));
                error.append("First product defined here.", first.location.clone());
                error.append("Second product defined here.", product.location.clone());
                return Err(ResolverError::Fatal(error));
            }
            seen.insert(unique_name, product);
        }
        Ok(())
    }
}

// --- Free helpers ---

/// Turns a property's source into a callable function expression taking
/// `argument_names`.
fn source_code_as_function(value: &JsSourceValue, argument_names: &[String]) -> String {
    let args = argument_names.join(",");
    if value.has_function_form {
        // `(function(){...})()`: put the arguments in and drop the call.
        let mut code = value.source_code_for_evaluation();
        if code.is_char_boundary(10) {
            code.insert_str(10, &args);
        }
        match code.strip_suffix("()") {
            Some(stripped) => stripped.to_string(),
            None => code,
        }
    } else {
        format!("(function({}){{return {};}})", args, value.source_code)
    }
}

/// Collects script bindings below `item` as dotted names. Bindings already
/// seen in a derived item shadow those of its prototypes.
fn collect_artifact_bindings(
    pool: &ItemPool,
    item: ItemId,
    prefix: QualifiedId,
    seen: &mut HashSet<QualifiedId>,
    bindings: &mut Vec<RuleArtifactBinding>,
) {
    for (key, value) in &pool[item].properties {
        let mut name = prefix.clone();
        name.push(key.clone());
        match value {
            Value::Item(nested) => collect_artifact_bindings(pool, *nested, name, seen, bindings),
            Value::JsSource(source) => {
                if seen.insert(name.clone()) {
                    bindings.push(RuleArtifactBinding {
                        name,
                        code: source.source_code_for_evaluation(),
                        location: source.location.clone(),
                    });
                }
            }
            Value::Variant(_) => {}
        }
    }
}

/// Appends `_` to sibling sub-projects until their names are unique.
fn make_sub_project_names_unique(top: &mut TopLevelProject, project: ProjectId) {
    let sub_projects = top[project].sub_projects.clone();
    let mut names: HashSet<String> = HashSet::new();
    let mut renames = Vec::new();
    for sub in &sub_projects {
        if !names.insert(top[*sub].name.clone()) {
            renames.push(*sub);
        }
        make_sub_project_names_unique(top, *sub);
    }
    for sub in renames {
        let mut name = top[sub].name.clone();
        while names.contains(&name) {
            name.push('_');
        }
        names.insert(name.clone());
        top[sub].name = name;
    }
}

/// Applies file taggers, artifact properties and the `installable` tag to a
/// product's files.
fn finalize_product_files(product: &mut ResolvedProduct) {
    product
        .file_taggers
        .sort_by(|a, b| b.priority().cmp(&a.priority()));

    let tagger_results: Vec<Option<FileTags>> = product
        .all_enabled_files()
        .map(|artifact| {
            (!artifact.override_file_tags || artifact.file_tags.is_empty()).then(|| {
                product.file_tags_for_file_name(paths::file_name(&artifact.absolute_file_path))
            })
        })
        .collect();
    let artifact_properties = product.artifact_properties.clone();
    let enabled_files = product
        .groups
        .iter_mut()
        .filter(|g| g.enabled)
        .flat_map(ResolvedGroup::all_files_mut);
    for (artifact, tags) in enabled_files.zip(tagger_results) {
        if let Some(tags) = tags {
            artifact.file_tags.extend(tags);
            if artifact.file_tags.is_empty() {
                artifact.file_tags.insert(UNKNOWN_FILE_TAG.to_string());
            }
            trace!(
                "Tagged '{}' with {:?}.",
                artifact.absolute_file_path, artifact.file_tags
            );
        }
        if !artifact.target_of_module.is_empty() {
            continue;
        }
        for ap in &artifact_properties {
            if !artifact.file_tags.is_disjoint(&ap.file_tags_filter) {
                artifact.properties = Arc::clone(&ap.property_map);
                artifact.file_tags.extend(ap.extra_file_tags.iter().cloned());
            }
        }
    }

    for artifact in product.groups.iter_mut().flat_map(ResolvedGroup::all_files_mut) {
        if artifact
            .properties
            .qbs_property_value(INSTALL_PROPERTY)
            .is_some_and(Variant::to_bool)
        {
            artifact.file_tags.insert(INSTALLABLE_TAG.to_string());
        }
    }
}
