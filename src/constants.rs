// src/constants.rs

// --- Item property names ---

pub const NAME_PROPERTY: &str = "name";
pub const CONDITION_PROPERTY: &str = "condition";
pub const PROFILE_PROPERTY: &str = "profile";
pub const PRESENT_PROPERTY: &str = "present";
pub const FILES_PROPERTY: &str = "files";
pub const EXCLUDE_FILES_PROPERTY: &str = "excludeFiles";
pub const FILE_TAGS_PROPERTY: &str = "fileTags";
pub const FILE_TAGS_FILTER_PROPERTY: &str = "fileTagsFilter";
pub const OVERRIDE_TAGS_PROPERTY: &str = "overrideTags";
pub const PREFIX_PROPERTY: &str = "prefix";
pub const TYPE_PROPERTY: &str = "type";
pub const TARGET_NAME_PROPERTY: &str = "targetName";
pub const SOURCE_DIRECTORY_PROPERTY: &str = "sourceDirectory";
pub const DESTINATION_DIRECTORY_PROPERTY: &str = "destinationDirectory";
pub const BUILD_DIRECTORY_PROPERTY: &str = "buildDirectory";
pub const BUILT_BY_DEFAULT_PROPERTY: &str = "builtByDefault";
pub const MULTIPLEX_CONFIGURATION_ID_PROPERTY: &str = "multiplexConfigurationId";
pub const ADDITIONAL_PRODUCT_TYPES_PROPERTY: &str = "additionalProductTypes";
pub const SETUP_BUILD_ENVIRONMENT_PROPERTY: &str = "setupBuildEnvironment";
pub const SETUP_RUN_ENVIRONMENT_PROPERTY: &str = "setupRunEnvironment";

pub const MULTIPLEX_PROPERTY: &str = "multiplex";
pub const ALWAYS_RUN_PROPERTY: &str = "alwaysRun";
pub const INPUTS_PROPERTY: &str = "inputs";
pub const INPUTS_FROM_DEPENDENCIES_PROPERTY: &str = "inputsFromDependencies";
pub const REQUIRES_INPUTS_PROPERTY: &str = "requiresInputs";
pub const AUXILIARY_INPUTS_PROPERTY: &str = "auxiliaryInputs";
pub const EXCLUDED_AUXILIARY_INPUTS_PROPERTY: &str = "excludedAuxiliaryInputs";
pub const EXPLICITLY_DEPENDS_ON_PROPERTY: &str = "explicitlyDependsOn";
pub const OUTPUT_FILE_TAGS_PROPERTY: &str = "outputFileTags";
pub const OUTPUT_ARTIFACTS_PROPERTY: &str = "outputArtifacts";
pub const PREPARE_PROPERTY: &str = "prepare";
pub const FILE_PATH_PROPERTY: &str = "filePath";
pub const ALWAYS_UPDATED_PROPERTY: &str = "alwaysUpdated";

pub const PATTERNS_PROPERTY: &str = "patterns";
pub const PRIORITY_PROPERTY: &str = "priority";
pub const RECURSIVE_PROPERTY: &str = "recursive";
pub const SEARCH_PATHS_PROPERTY: &str = "searchPaths";
pub const SCAN_PROPERTY: &str = "scan";

/// Internal property set by the loader on groups that collect a module's output artifacts.
pub const MODULE_PROPERTY_INTERNAL: &str = "__module";

// --- The "qbs" module ---

pub const QBS_MODULE: &str = "qbs";
pub const INSTALL_PROPERTY: &str = "install";
pub const CONFIGURATION_NAME_PROPERTY: &str = "configurationName";

// --- File tags ---

/// Tag assigned to files that no tagger or declaration could classify.
pub const UNKNOWN_FILE_TAG: &str = "unknown-file-tag";

/// Tag synthesized for every source artifact whose `qbs.install` is truthy.
pub const INSTALLABLE_TAG: &str = "installable";

/// Profile value matching a dependency against every profile of a product.
pub const PROFILE_WILDCARD: &str = "*";
/// Profile used when neither the setup nor the build configuration names one.
pub const DEFAULT_PROFILE: &str = "none";

// --- Persistence ---

/// Suffix of the persisted project file inside the build directory.
pub const BUILD_GRAPH_FILE_SUFFIX: &str = ".bg";

/// Leading bytes identifying a persisted project file.
pub const BUILD_GRAPH_MAGIC: &[u8; 8] = b"PRJGRAPH";

/// Bumped whenever the persisted model changes shape.
pub const BUILD_GRAPH_FORMAT_VERSION: u32 = 1;
