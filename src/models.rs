// src/models.rs

//! # Resolved Project Model
//!
//! The output of [`ProjectResolver`](crate::core::project_resolver::ProjectResolver):
//! a fully evaluated, serializable tree of projects, products, groups, modules
//! and rules.
//!
//! ## Ownership
//!
//! The [`TopLevelProject`] owns two arenas, one for projects and one for
//! products. Parents refer to children and children to their parents through
//! [`ProjectId`] / [`ProductId`] indices, never through a second owning
//! reference. Everything below a product (groups, artifacts, rules, modules) is
//! owned by value; only immutable snapshots (`PropertyMap`, `ResolvedModule`,
//! file contexts) are shared through `Arc`.

use crate::constants::{
    BUILD_DIRECTORY_PROPERTY, BUILD_GRAPH_FILE_SUFFIX, BUILT_BY_DEFAULT_PROPERTY,
    CONFIGURATION_NAME_PROPERTY, PROFILE_PROPERTY, QBS_MODULE,
};
use crate::core::error_info::{CodeLocation, ErrorInfo};
use crate::core::item::JsImport;
use crate::core::paths;
use crate::core::property_map::PropertyMap;
use crate::core::variant::{Variant, VariantMap};
use crate::core::wildcards::{self, SourceWildCards, WildcardError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A set of file tags, ordered for deterministic output.
pub type FileTags = BTreeSet<String>;

// --- Time stamps ---

/// A `SystemTime` wrapper that is serializable and totally ordered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(Duration);

impl FileTime {
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// The modification time of `path`, or `None` if it cannot be stat'ed.
    pub fn of_path(path: &Path) -> Option<Self> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(Self::from)
    }
}

impl From<SystemTime> for FileTime {
    fn from(time: SystemTime) -> Self {
        Self(time.duration_since(UNIX_EPOCH).unwrap_or_default())
    }
}

impl From<FileTime> for SystemTime {
    fn from(time: FileTime) -> Self {
        UNIX_EPOCH + time.0
    }
}

// --- Arena handles ---

/// Index of a [`ResolvedProject`] inside its [`TopLevelProject`]. The root is `0`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub usize);

/// Index of a [`ResolvedProduct`] inside its [`TopLevelProject`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId(pub usize);

// --- Source content ---

/// One concrete file of a product.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceArtifact {
    /// Cleaned, absolute path with `/` separators.
    pub absolute_file_path: String,
    pub file_tags: FileTags,
    /// The tags are authoritative; file taggers must not add to them.
    pub override_file_tags: bool,
    /// Name of the module this file is an output target of, if any.
    pub target_of_module: String,
    pub properties: Arc<PropertyMap>,
}

impl Default for SourceArtifact {
    fn default() -> Self {
        Self {
            absolute_file_path: String::new(),
            file_tags: FileTags::new(),
            override_file_tags: true,
            target_of_module: String::new(),
            properties: Arc::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    pub name: String,
    pub enabled: bool,
    pub location: CodeLocation,
    pub prefix: String,
    /// Files listed literally.
    pub files: Vec<SourceArtifact>,
    pub wildcards: Option<SourceWildCards>,
    pub properties: Arc<PropertyMap>,
    pub file_tags: FileTags,
    pub override_tags: bool,
    pub target_of_module: String,
}

impl Default for ResolvedGroup {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            location: CodeLocation::default(),
            prefix: String::new(),
            files: Vec::new(),
            wildcards: None,
            properties: Arc::default(),
            file_tags: FileTags::new(),
            override_tags: false,
            target_of_module: String::new(),
        }
    }
}

impl ResolvedGroup {
    /// Literal files followed by wildcard-expanded ones.
    pub fn all_files(&self) -> impl Iterator<Item = &SourceArtifact> {
        self.files
            .iter()
            .chain(self.wildcards.iter().flat_map(|w| w.files.iter()))
    }

    pub fn all_files_mut(&mut self) -> impl Iterator<Item = &mut SourceArtifact> {
        self.files
            .iter_mut()
            .chain(self.wildcards.iter_mut().flat_map(|w| w.files.iter_mut()))
    }
}

/// Module property overrides applied to every file whose tags intersect
/// `file_tags_filter`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ArtifactProperties {
    pub file_tags_filter: FileTags,
    pub property_map: Arc<PropertyMap>,
    pub extra_file_tags: FileTags,
}

/// Assigns tags to files by name.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FileTagger {
    patterns: Vec<String>,
    file_tags: FileTags,
    priority: i64,
    #[serde(skip)]
    compiled: OnceLock<Vec<Regex>>,
}

impl FileTagger {
    /// # Errors
    /// Returns [`WildcardError::InvalidPattern`] if a pattern cannot be compiled.
    pub fn new(patterns: Vec<String>, file_tags: FileTags, priority: i64) -> Result<Self, WildcardError> {
        let compiled = patterns
            .iter()
            .map(|p| wildcards::wildcard_to_regex(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            file_tags,
            priority,
            compiled: OnceLock::from(compiled),
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn file_tags(&self) -> &FileTags {
        &self.file_tags
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns `true` if any pattern matches `file_name`.
    pub fn matches(&self, file_name: &str) -> bool {
        self.compiled
            .get_or_init(|| {
                self.patterns
                    .iter()
                    .filter_map(|p| wildcards::wildcard_to_regex(p).ok())
                    .collect()
            })
            .iter()
            .any(|re| re.is_match(file_name))
    }
}

impl PartialEq for FileTagger {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
            && self.file_tags == other.file_tags
            && self.priority == other.priority
    }
}

// --- Scripts ---

/// Everything a script needs from the file it was written in.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFileContext {
    pub file_path: String,
    pub search_paths: Vec<String>,
    pub js_imports: Vec<JsImport>,
    pub js_extensions: Vec<String>,
}

/// An opaque script body, stored as callable source text.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScriptFunction {
    /// `(function(args){...})`, ready to be called by the rule executor.
    pub source_code: String,
    pub location: CodeLocation,
    pub file_context: Option<Arc<ResolvedFileContext>>,
}

impl ScriptFunction {
    pub fn is_valid(&self) -> bool {
        self.location.line > 0 && !self.source_code.is_empty()
    }
}

// --- Rules, modules, scanners ---

/// A property binding applied to an artifact a rule creates.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RuleArtifactBinding {
    /// Dotted property path, e.g. `["cpp", "defines"]`.
    pub name: Vec<String>,
    pub code: String,
    pub location: CodeLocation,
}

/// An output template of a rule.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RuleArtifact {
    /// Unevaluated source of the output path expression.
    pub file_path: String,
    pub file_path_location: CodeLocation,
    pub file_tags: FileTags,
    pub always_updated: bool,
    pub location: CodeLocation,
    pub bindings: Vec<RuleArtifactBinding>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResolvedModule {
    pub name: String,
    pub module_dependencies: Vec<String>,
    pub setup_build_environment_script: ScriptFunction,
    pub setup_run_environment_script: ScriptFunction,
    /// The module stands for a product rather than a reusable module.
    pub is_product: bool,
    pub product: Option<ProductId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub prepare_script: ScriptFunction,
    pub output_artifacts_script: ScriptFunction,
    pub module: Arc<ResolvedModule>,
    pub inputs: FileTags,
    pub inputs_from_dependencies: FileTags,
    pub auxiliary_inputs: FileTags,
    pub excluded_auxiliary_inputs: FileTags,
    pub explicitly_depends_on: FileTags,
    pub output_file_tags: FileTags,
    pub artifacts: Vec<RuleArtifact>,
    pub multiplex: bool,
    pub requires_inputs: bool,
    pub always_run: bool,
}

impl Rule {
    /// The union of the tags of all artifact templates.
    pub fn static_output_file_tags(&self) -> FileTags {
        self.artifacts
            .iter()
            .flat_map(|a| a.file_tags.iter().cloned())
            .collect()
    }

    /// Output tags including extra tags that artifact properties attach to them.
    pub fn collected_output_file_tags(&self, artifact_properties: &[ArtifactProperties]) -> FileTags {
        let mut result = if self.output_file_tags.is_empty() {
            self.static_output_file_tags()
        } else {
            self.output_file_tags.clone()
        };
        for ap in artifact_properties {
            if !ap.file_tags_filter.is_disjoint(&result) {
                result.extend(ap.extra_file_tags.iter().cloned());
            }
        }
        result
    }

    /// Outputs are computed by a script rather than declared statically.
    pub fn is_dynamic(&self) -> bool {
        self.output_artifacts_script.is_valid()
    }

    pub fn declares_inputs(&self) -> bool {
        !self.inputs.is_empty() || !self.inputs_from_dependencies.is_empty()
    }

    pub fn accepts_as_input(&self, file_tags: &FileTags) -> bool {
        !file_tags.is_disjoint(&self.inputs)
    }

    /// `[outputs][inputs]`, both sorted.
    pub fn display(&self, artifact_properties: &[ArtifactProperties]) -> String {
        let outputs: Vec<String> = self
            .collected_output_file_tags(artifact_properties)
            .into_iter()
            .collect();
        let inputs: Vec<&str> = self
            .inputs
            .union(&self.inputs_from_dependencies)
            .map(String::as_str)
            .collect();
        format!("[{}][{}]", outputs.join(","), inputs.join(","))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedScanner {
    pub module: Arc<ResolvedModule>,
    pub inputs: FileTags,
    pub recursive: bool,
    pub search_paths_script: ScriptFunction,
    pub scan_script: ScriptFunction,
}

// --- Probes ---

/// Inputs and outputs of a configuration probe that ran during loading.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Probe {
    pub global_id: String,
    pub location: CodeLocation,
    pub condition: bool,
    pub configure_script: String,
    pub properties: VariantMap,
    pub initial_properties: VariantMap,
    pub imported_files_used: Vec<String>,
}

impl Probe {
    /// Returns `true` if a file the probe read is gone or newer than `reference_time`.
    pub fn needs_reconfigure(&self, reference_time: FileTime) -> bool {
        self.imported_files_used
            .iter()
            .any(|f| FileTime::of_path(Path::new(f)).is_none_or(|t| t > reference_time))
    }
}

// --- Products ---

/// Opaque data attached by the build-graph stage.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductBuildData(pub Vec<u8>);

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ResolvedProduct {
    pub enabled: bool,
    /// The product type.
    pub file_tags: FileTags,
    pub name: String,
    pub profile: String,
    pub target_name: String,
    pub multiplex_configuration_id: String,
    pub source_directory: String,
    pub destination_directory: String,
    pub location: CodeLocation,
    pub product_properties: VariantMap,
    pub module_properties: Arc<PropertyMap>,
    pub rules: Vec<Rule>,
    pub dependencies: Vec<ProductId>,
    pub dependency_parameters: BTreeMap<ProductId, VariantMap>,
    pub file_taggers: Vec<FileTagger>,
    pub modules: Vec<Arc<ResolvedModule>>,
    pub module_parameters: BTreeMap<String, VariantMap>,
    pub scanners: Vec<ResolvedScanner>,
    pub groups: Vec<ResolvedGroup>,
    pub probes: Vec<Probe>,
    pub artifact_properties: Vec<ArtifactProperties>,
    pub missing_source_files: BTreeSet<String>,
    pub project: ProjectId,
    pub build_data: Option<ProductBuildData>,
    #[serde(skip)]
    executable_path_cache: Mutex<HashMap<String, String>>,
}

impl ResolvedProduct {
    /// An enabled, otherwise empty product declared at `location` inside `project`.
    pub fn new(location: CodeLocation, project: ProjectId) -> Self {
        Self {
            enabled: true,
            location,
            project,
            ..Self::default()
        }
    }

    pub fn unique_name_of(name: &str, multiplex_configuration_id: &str) -> String {
        if multiplex_configuration_id.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, multiplex_configuration_id)
        }
    }

    /// `name`, or `name.multiplexId` for multiplexed products.
    pub fn unique_name(&self) -> String {
        Self::unique_name_of(&self.name, &self.multiplex_configuration_id)
    }

    pub fn full_display_name_of(name: &str, multiplex_configuration_id: &str) -> String {
        if multiplex_configuration_id.is_empty() {
            name.to_string()
        } else {
            format!("{} ({})", name, multiplex_configuration_id)
        }
    }

    pub fn full_display_name(&self) -> String {
        Self::full_display_name_of(&self.name, &self.multiplex_configuration_id)
    }

    /// A file-system safe directory name that stays unique per product.
    pub fn derive_build_directory_name(name: &str, multiplex_configuration_id: &str) -> String {
        let unique = Self::unique_name_of(name, multiplex_configuration_id);
        let hash = blake3::hash(unique.as_bytes());
        let digest = hex::encode(hash.as_bytes());
        format!(
            "{}.{}",
            paths::rfc1034_identifier(&unique),
            digest.get(..8).unwrap_or(&digest)
        )
    }

    pub fn build_directory(&self) -> String {
        self.product_properties
            .get(BUILD_DIRECTORY_PROPERTY)
            .map(Variant::to_string_value)
            .unwrap_or_default()
    }

    pub fn built_by_default(&self) -> bool {
        self.product_properties
            .get(BUILT_BY_DEFAULT_PROPERTY)
            .is_none_or(Variant::to_bool)
    }

    pub fn all_files(&self) -> impl Iterator<Item = &SourceArtifact> {
        self.groups.iter().flat_map(ResolvedGroup::all_files)
    }

    pub fn all_enabled_files(&self) -> impl Iterator<Item = &SourceArtifact> {
        self.groups
            .iter()
            .filter(|g| g.enabled)
            .flat_map(ResolvedGroup::all_files)
    }

    /// Tags the product's file taggers assign to `file_name`.
    ///
    /// Taggers are expected in descending priority order. All matching taggers
    /// of the highest matching priority contribute.
    pub fn file_tags_for_file_name(&self, file_name: &str) -> FileTags {
        let mut result = FileTags::new();
        let mut priority = None;
        for tagger in &self.file_taggers {
            if !tagger.matches(file_name) {
                continue;
            }
            match priority {
                Some(p) if p != tagger.priority() => break,
                Some(_) => {}
                None => priority = Some(tagger.priority()),
            }
            result.extend(tagger.file_tags().iter().cloned());
        }
        result
    }

    pub fn cache_executable_path(&self, original_file_path: &str, full_file_path: &str) {
        if let Ok(mut cache) = self.executable_path_cache.lock() {
            cache.insert(original_file_path.to_string(), full_file_path.to_string());
        }
    }

    pub fn cached_executable_path(&self, original_file_path: &str) -> Option<String> {
        self.executable_path_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(original_file_path).cloned())
    }
}

// --- Projects ---

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResolvedProject {
    pub name: String,
    pub location: CodeLocation,
    pub enabled: bool,
    pub products: Vec<ProductId>,
    pub sub_projects: Vec<ProjectId>,
    pub parent_project: Option<ProjectId>,
    pub project_properties: VariantMap,
}

/// The root of a resolved project tree, plus everything that belongs to the
/// resolution as a whole.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TopLevelProject {
    pub projects: Vec<ResolvedProject>,
    pub products: Vec<ResolvedProduct>,
    pub id: String,
    pub build_directory: String,
    pub build_configuration: VariantMap,
    pub environment: BTreeMap<String, String>,
    pub used_environment: BTreeMap<String, String>,
    pub canonical_file_path_results: BTreeMap<String, String>,
    pub file_exists_results: BTreeMap<String, bool>,
    pub directory_entries_results: BTreeMap<String, Vec<String>>,
    pub file_last_modified_results: BTreeMap<String, FileTime>,
    pub probes: Vec<Probe>,
    pub profile_configs: BTreeMap<String, VariantMap>,
    pub overridden_values: VariantMap,
    pub build_system_files: BTreeSet<String>,
    pub last_start_resolve_time: FileTime,
    pub last_end_resolve_time: FileTime,
    pub warnings: Vec<ErrorInfo>,
}

impl TopLevelProject {
    /// The root project; the arena always holds it once resolution started.
    pub const ROOT: ProjectId = ProjectId(0);

    /// The configuration name stored in `qbs.configurationName`.
    pub fn derive_id(config: &VariantMap) -> String {
        config
            .get(QBS_MODULE)
            .and_then(Variant::as_map)
            .and_then(|qbs| qbs.get(CONFIGURATION_NAME_PROPERTY))
            .map(Variant::to_string_value)
            .unwrap_or_default()
    }

    pub fn derive_build_directory(build_root: &str, id: &str) -> String {
        format!("{}/{}", build_root, id)
    }

    /// Stores the configuration and derives the project id from it.
    pub fn set_build_configuration(&mut self, config: VariantMap) {
        self.id = Self::derive_id(&config);
        self.build_configuration = config;
    }

    pub fn profile(&self) -> String {
        self.build_configuration
            .get(QBS_MODULE)
            .and_then(Variant::as_map)
            .and_then(|qbs| qbs.get(PROFILE_PROPERTY))
            .map(Variant::to_string_value)
            .unwrap_or_default()
    }

    pub fn build_graph_file_path(&self) -> String {
        format!("{}/{}{}", self.build_directory, self.id, BUILD_GRAPH_FILE_SUFFIX)
    }

    pub fn project(&self, id: ProjectId) -> Option<&ResolvedProject> {
        self.projects.get(id.0)
    }

    pub fn product(&self, id: ProductId) -> Option<&ResolvedProduct> {
        self.products.get(id.0)
    }

    pub fn root(&self) -> Option<&ResolvedProject> {
        self.project(Self::ROOT)
    }

    /// Products of `project` and of all its sub-projects, depth first.
    pub fn all_products(&self, project: ProjectId) -> Vec<ProductId> {
        let Some(p) = self.project(project) else {
            return Vec::new();
        };
        let mut result = p.products.clone();
        for sub in &p.sub_projects {
            result.extend(self.all_products(*sub));
        }
        result
    }

    /// All transitive sub-projects of `project`.
    pub fn all_sub_projects(&self, project: ProjectId) -> Vec<ProjectId> {
        let Some(p) = self.project(project) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for sub in &p.sub_projects {
            result.push(*sub);
            result.extend(self.all_sub_projects(*sub));
        }
        result
    }

    /// Returns `true` if `other` lives in `product`'s project or below it.
    pub fn is_in_parent_project(&self, product: ProductId, other: ProductId) -> bool {
        let (Some(product), Some(other)) = (self.product(product), self.product(other)) else {
            return false;
        };
        let mut current = Some(other.project);
        while let Some(id) = current {
            if id == product.project {
                return true;
            }
            current = self.project(id).and_then(|p| p.parent_project);
        }
        false
    }

    /// Looks up an enabled or disabled product by its unique name.
    pub fn product_by_unique_name(&self, unique_name: &str) -> Option<ProductId> {
        self.products
            .iter()
            .position(|p| p.unique_name() == unique_name)
            .map(ProductId)
    }
}

impl fmt::Display for TopLevelProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.root().map_or("", |r| r.name.as_str());
        write!(f, "{} ({} products)", name, self.products.len())
    }
}

// Ids are only minted by the resolver when it pushes into the arenas.
#[allow(clippy::indexing_slicing)]
impl Index<ProjectId> for TopLevelProject {
    type Output = ResolvedProject;

    fn index(&self, id: ProjectId) -> &ResolvedProject {
        &self.projects[id.0]
    }
}

#[allow(clippy::indexing_slicing)]
impl IndexMut<ProjectId> for TopLevelProject {
    fn index_mut(&mut self, id: ProjectId) -> &mut ResolvedProject {
        &mut self.projects[id.0]
    }
}

#[allow(clippy::indexing_slicing)]
impl Index<ProductId> for TopLevelProject {
    type Output = ResolvedProduct;

    fn index(&self, id: ProductId) -> &ResolvedProduct {
        &self.products[id.0]
    }
}

#[allow(clippy::indexing_slicing)]
impl IndexMut<ProductId> for TopLevelProject {
    fn index_mut(&mut self, id: ProductId) -> &mut ResolvedProduct {
        &mut self.products[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> FileTags {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unique_and_build_directory_names() {
        assert_eq!(ResolvedProduct::unique_name_of("app", ""), "app");
        assert_eq!(ResolvedProduct::unique_name_of("app", "x64"), "app.x64");
        assert_eq!(ResolvedProduct::full_display_name_of("app", "x64"), "app (x64)");

        let dir = ResolvedProduct::derive_build_directory_name("my app", "x64");
        let (stem, hash) = dir.rsplit_once('.').unwrap();
        assert_eq!(stem, "my-app-x64");
        assert_eq!(hash.len(), 8);
        assert_eq!(dir, ResolvedProduct::derive_build_directory_name("my app", "x64"));
        assert_ne!(dir, ResolvedProduct::derive_build_directory_name("my app", "arm"));
    }

    #[test]
    fn test_file_tags_for_file_name_uses_highest_matching_priority() {
        // --- Setup ---
        let product = ResolvedProduct {
            file_taggers: vec![
                FileTagger::new(vec!["*.moc.cpp".into()], tags(&["moc"]), 10).unwrap(),
                FileTagger::new(vec!["*.cpp".into()], tags(&["cpp"]), 0).unwrap(),
                FileTagger::new(vec!["*.cpp".into(), "*.cxx".into()], tags(&["source"]), 0).unwrap(),
            ],
            ..ResolvedProduct::default()
        };

        // --- Execute & Assert ---
        assert_eq!(product.file_tags_for_file_name("a.moc.cpp"), tags(&["moc"]));
        assert_eq!(product.file_tags_for_file_name("a.cpp"), tags(&["cpp", "source"]));
        assert_eq!(product.file_tags_for_file_name("a.cxx"), tags(&["source"]));
        assert!(product.file_tags_for_file_name("a.h").is_empty());
    }

    #[test]
    fn test_rule_helpers() {
        let rule = Rule {
            name: "compiler".into(),
            prepare_script: ScriptFunction::default(),
            output_artifacts_script: ScriptFunction::default(),
            module: Arc::default(),
            inputs: tags(&["cpp"]),
            inputs_from_dependencies: tags(&["staticlibrary"]),
            auxiliary_inputs: FileTags::new(),
            excluded_auxiliary_inputs: FileTags::new(),
            explicitly_depends_on: FileTags::new(),
            output_file_tags: FileTags::new(),
            artifacts: vec![RuleArtifact {
                file_tags: tags(&["obj"]),
                ..RuleArtifact::default()
            }],
            multiplex: false,
            requires_inputs: true,
            always_run: false,
        };
        let ap = ArtifactProperties {
            file_tags_filter: tags(&["obj"]),
            extra_file_tags: tags(&["intermediate"]),
            ..ArtifactProperties::default()
        };

        assert!(rule.declares_inputs());
        assert!(!rule.is_dynamic());
        assert!(rule.accepts_as_input(&tags(&["cpp", "c"])));
        assert_eq!(rule.collected_output_file_tags(&[ap.clone()]), tags(&["intermediate", "obj"]));
        assert_eq!(rule.display(&[ap]), "[intermediate,obj][cpp,staticlibrary]");
    }

    #[test]
    fn test_project_queries() {
        // --- Setup ---
        let mut top = TopLevelProject::default();
        top.projects.push(ResolvedProject {
            name: "root".into(),
            products: vec![ProductId(0)],
            sub_projects: vec![ProjectId(1)],
            ..ResolvedProject::default()
        });
        top.projects.push(ResolvedProject {
            name: "sub".into(),
            products: vec![ProductId(1)],
            parent_project: Some(ProjectId(0)),
            ..ResolvedProject::default()
        });
        top.products.push(ResolvedProduct {
            name: "lib".into(),
            project: ProjectId(0),
            ..ResolvedProduct::default()
        });
        top.products.push(ResolvedProduct {
            name: "app".into(),
            project: ProjectId(1),
            ..ResolvedProduct::default()
        });

        // --- Assert ---
        assert_eq!(top.all_products(TopLevelProject::ROOT), vec![ProductId(0), ProductId(1)]);
        assert_eq!(top.all_sub_projects(TopLevelProject::ROOT), vec![ProjectId(1)]);
        assert!(top.is_in_parent_project(ProductId(0), ProductId(1)));
        assert!(!top.is_in_parent_project(ProductId(1), ProductId(0)));
        assert_eq!(top.product_by_unique_name("app"), Some(ProductId(1)));
    }

    #[test]
    fn test_derive_id_and_build_directory() {
        let mut qbs = VariantMap::new();
        qbs.insert("configurationName".into(), Variant::from("debug"));
        qbs.insert("profile".into(), Variant::from("gcc"));
        let mut config = VariantMap::new();
        config.insert("qbs".into(), Variant::Map(qbs));

        let mut top = TopLevelProject::default();
        top.set_build_configuration(config);
        top.build_directory = TopLevelProject::derive_build_directory("/b", &top.id);

        assert_eq!(top.id, "debug");
        assert_eq!(top.profile(), "gcc");
        assert_eq!(top.build_graph_file_path(), "/b/debug/debug.bg");
    }

    #[test]
    fn test_probe_needs_reconfigure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe-input.txt");
        std::fs::write(&file, "x").unwrap();
        let stamp = FileTime::of_path(&file).unwrap();

        let probe = Probe {
            imported_files_used: vec![file.to_string_lossy().into_owned()],
            ..Probe::default()
        };
        assert!(!probe.needs_reconfigure(stamp));

        std::fs::remove_file(&file).unwrap();
        assert!(probe.needs_reconfigure(stamp));
    }

    #[test]
    fn test_new_product_is_enabled_and_owned_by_project() {
        let location = CodeLocation::new("/src/project.qbs", 4, 5);

        let product = ResolvedProduct::new(location.clone(), ProjectId(2));

        assert!(product.enabled);
        assert_eq!(product.location, location);
        assert_eq!(product.project, ProjectId(2));
        assert!(product.groups.is_empty());
        assert_eq!(product.cached_executable_path("gcc"), None);
    }

    #[test]
    fn test_executable_path_cache() {
        let product = ResolvedProduct::default();
        product.cache_executable_path("gcc", "/usr/bin/gcc");
        assert_eq!(product.cached_executable_path("gcc").as_deref(), Some("/usr/bin/gcc"));
        assert_eq!(product.cached_executable_path("clang"), None);
    }
}
