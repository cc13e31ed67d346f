// src/core/setup_parameters.rs

//! # Setup Parameters
//!
//! Everything the resolver needs to know about the build that is not part of
//! the description itself: where the build goes, which configuration is being
//! resolved and how forgiving to be about broken products.
//!
//! Parameters can be written by hand as TOML:
//!
//! ```toml
//! build_root = "~/builds/app"
//! configuration_name = "debug"
//! product_error_mode = "relaxed"
//!
//! [build_configuration.qbs]
//! profile = "gcc"
//! ```

use crate::constants::{CONFIGURATION_NAME_PROPERTY, DEFAULT_PROFILE, PROFILE_PROPERTY, QBS_MODULE};
use crate::core::paths;
use crate::core::variant::{Variant, VariantMap, natural_map};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("I/O error while reading setup parameters: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse setup parameters at '{path}': {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No build root set.")]
    MissingBuildRoot,

    #[error("Invalid build root '{0}'.")]
    InvalidBuildRoot(String),
}

type SetupResult<T> = Result<T, SetupError>;

/// How errors that affect only one product or rule are treated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandlingMode {
    /// Any error aborts resolution.
    #[default]
    Strict,
    /// Broken entities are disabled and reported as warnings.
    Relaxed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SetupProjectParameters {
    pub build_root: String,
    pub configuration_name: String,
    pub top_level_profile: String,
    #[serde(with = "natural_map")]
    pub build_configuration: VariantMap,
    #[serde(with = "natural_map")]
    pub overridden_values: VariantMap,
    pub environment: BTreeMap<String, String>,
    pub product_error_mode: ErrorHandlingMode,
}

impl SetupProjectParameters {
    /// Reads parameters from a TOML file. The result still needs [`finalize`](Self::finalize).
    ///
    /// # Errors
    /// Returns [`SetupError::Io`] or [`SetupError::TomlParse`].
    pub fn load(path: &Path) -> SetupResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| SetupError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validates the parameters and normalizes the build root.
    ///
    /// The build root gets `~` expanded and is made absolute. The
    /// configuration name is copied into `qbs.configurationName` unless the
    /// build configuration already names one. An empty top-level profile is
    /// taken from `qbs.profile`, or `none`.
    ///
    /// # Errors
    /// Returns [`SetupError::MissingBuildRoot`] for an empty build root.
    pub fn finalize(&mut self) -> SetupResult<()> {
        if self.build_root.trim().is_empty() {
            return Err(SetupError::MissingBuildRoot);
        }
        let expanded = paths::expand_home(&self.build_root);
        let absolute = paths::absolute_simplified(Path::new(&expanded))?;
        let root = absolute
            .to_str()
            .ok_or_else(|| SetupError::InvalidBuildRoot(self.build_root.clone()))?;
        self.build_root = paths::clean_path(root);

        if self.configuration_name.is_empty() {
            self.configuration_name = "default".to_string();
        }
        let qbs = self
            .build_configuration
            .entry(QBS_MODULE.to_string())
            .or_insert_with(|| Variant::Map(VariantMap::new()));
        if let Variant::Map(qbs) = qbs {
            qbs.entry(CONFIGURATION_NAME_PROPERTY.to_string())
                .or_insert_with(|| Variant::from(self.configuration_name.as_str()));
            if self.top_level_profile.is_empty() {
                self.top_level_profile = qbs
                    .get(PROFILE_PROPERTY)
                    .map(Variant::to_string_value)
                    .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
            }
        }
        log::debug!(
            "Setup parameters finalized: build root '{}', configuration '{}'.",
            self.build_root,
            self.configuration_name
        );
        Ok(())
    }

    pub fn is_relaxed(&self) -> bool {
        self.product_error_mode == ErrorHandlingMode::Relaxed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TopLevelProject;

    #[test]
    fn test_load_and_finalize_from_toml() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("setup.toml");
        fs::write(
            &file,
            r#"
build_root = "out/../build"
configuration_name = "release"
product_error_mode = "relaxed"

[build_configuration.qbs]
profile = "gcc"
"#,
        )
        .unwrap();

        // --- Execute ---
        let mut params = SetupProjectParameters::load(&file).unwrap();
        params.finalize().unwrap();

        // --- Assert ---
        assert!(params.is_relaxed());
        assert!(paths::is_absolute_path(&params.build_root));
        assert!(params.build_root.ends_with("/build"));
        assert_eq!(TopLevelProject::derive_id(&params.build_configuration), "release");
        assert_eq!(params.top_level_profile, "gcc");
    }

    #[test]
    fn test_explicit_configuration_name_is_kept() {
        let mut qbs = VariantMap::new();
        qbs.insert("configurationName".into(), Variant::from("custom"));
        let mut params = SetupProjectParameters {
            build_root: "/tmp/b".into(),
            configuration_name: "debug".into(),
            ..SetupProjectParameters::default()
        };
        params.build_configuration.insert("qbs".into(), Variant::Map(qbs));

        params.finalize().unwrap();

        assert_eq!(TopLevelProject::derive_id(&params.build_configuration), "custom");
        assert_eq!(params.product_error_mode, ErrorHandlingMode::Strict);
        assert_eq!(params.top_level_profile, "none");
    }

    #[test]
    fn test_missing_build_root_is_rejected() {
        let mut params = SetupProjectParameters::default();
        assert!(matches!(params.finalize(), Err(SetupError::MissingBuildRoot)));
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.toml");
        fs::write(&file, "build_root = [").unwrap();

        let err = SetupProjectParameters::load(&file).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
