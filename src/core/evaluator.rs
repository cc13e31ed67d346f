// src/core/evaluator.rs

//! # Evaluator Boundary
//!
//! The resolver never interprets script code itself. It asks an [`Evaluator`]
//! for the value of `(item, property)` and post-processes what comes back.
//!
//! Implementations must honor the item tree's prototype chains and may cache
//! internally. They also report, as a side product, which properties read which
//! other properties ([`PropertyDependencies`]) and which file-system queries
//! were made, so that the resolved project can later be checked for staleness.
//!
//! [`LiteralEvaluator`] is a small implementation for descriptions whose
//! script values are plain JSON literals. It backs the command line tool and
//! the tests.

use crate::core::error_info::{CodeLocation, ErrorInfo};
use crate::core::item::{ItemId, ItemPool, JsSourceValue, Value};
use crate::core::property_map::PropertyDependencies;
use crate::core::variant::Variant;
use crate::models::{FileTags, FileTime};
use std::collections::BTreeMap;
use thiserror::Error;

/// A failure reported by the script runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
    pub location: CodeLocation,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>, location: CodeLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl From<EvaluationError> for ErrorInfo {
    fn from(error: EvaluationError) -> Self {
        Self::new(error.message, error.location)
    }
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// File-system queries answered while evaluating, recorded for staleness checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSystemQueryResults {
    pub canonical_file_path_results: BTreeMap<String, String>,
    pub file_exists_results: BTreeMap<String, bool>,
    pub directory_entries_results: BTreeMap<String, Vec<String>>,
    pub file_last_modified_results: BTreeMap<String, FileTime>,
}

/// Computes property values of items.
///
/// Only [`value`](Evaluator::value) is required. The typed accessors are
/// convenience wrappers that apply the coercions the resolver relies on.
pub trait Evaluator {
    /// Evaluates `name` on `item`.
    ///
    /// Returns `Ok(None)` when the property is not set anywhere along the
    /// prototype chain or evaluates to `undefined`.
    ///
    /// # Errors
    /// Returns an [`EvaluationError`] if the property's script fails.
    fn value(&mut self, pool: &ItemPool, item: ItemId, name: &str)
    -> EvaluationResult<Option<Variant>>;

    /// Property dependencies recorded since the last clear.
    fn property_dependencies(&self) -> PropertyDependencies {
        PropertyDependencies::new()
    }

    /// Called at the start of each product.
    fn clear_property_dependencies(&mut self) {}

    /// File-system queries performed by scripts so far.
    fn file_system_results(&self) -> FileSystemQueryResults {
        FileSystemQueryResults::default()
    }

    /// The environment scripts were run with.
    fn environment(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// The subset of the environment scripts actually read.
    fn used_environment(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    // --- Typed accessors ---

    fn bool_value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
        default: bool,
    ) -> EvaluationResult<bool> {
        Ok(self
            .value(pool, item, name)?
            .map_or(default, |v| v.to_bool()))
    }

    fn int_value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
        default: i64,
    ) -> EvaluationResult<i64> {
        Ok(self
            .value(pool, item, name)?
            .and_then(|v| v.as_i64())
            .unwrap_or(default))
    }

    fn string_value(&mut self, pool: &ItemPool, item: ItemId, name: &str) -> EvaluationResult<String> {
        Ok(self
            .value(pool, item, name)?
            .map(|v| v.to_string_value())
            .unwrap_or_default())
    }

    /// Like [`string_value`](Evaluator::string_value), but tells "unset" apart from "".
    fn optional_string_value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
    ) -> EvaluationResult<Option<String>> {
        Ok(self.value(pool, item, name)?.map(|v| v.to_string_value()))
    }

    fn string_list_value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
    ) -> EvaluationResult<Vec<String>> {
        Ok(self
            .value(pool, item, name)?
            .map(|v| v.to_string_list())
            .unwrap_or_default())
    }

    /// Evaluates a tag list. `None` means the property was not set at all.
    fn file_tags_value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
    ) -> EvaluationResult<Option<FileTags>> {
        Ok(self
            .value(pool, item, name)?
            .map(|v| v.to_string_list().into_iter().collect()))
    }
}

// --- Literal evaluator ---

/// An [`Evaluator`] for descriptions whose script values are JSON literals.
///
/// Properties are looked up along the prototype chain. Script values are
/// parsed as JSON; single-quoted strings and `undefined` are accepted as well.
/// Anything else, including function bodies, is reported as an error.
#[derive(Debug, Default)]
pub struct LiteralEvaluator {
    property_dependencies: PropertyDependencies,
    environment: BTreeMap<String, String>,
    evaluations: usize,
}

impl LiteralEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `dependents` are computed from `property`.
    pub fn with_property_dependencies(mut self, dependencies: PropertyDependencies) -> Self {
        self.property_dependencies = dependencies;
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Number of script values evaluated so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn evaluate_source(&mut self, source: &JsSourceValue) -> EvaluationResult<Option<Variant>> {
        self.evaluations += 1;
        if source.has_function_form {
            return Err(EvaluationError::new(
                "Function bodies cannot be evaluated without a script runtime.",
                source.location.clone(),
            ));
        }
        parse_literal(&source.source_code)
            .ok_or_else(|| {
                EvaluationError::new(
                    format!(
                        "Cannot evaluate '{}': only literal values are supported.",
                        source.source_code.trim()
                    ),
                    source.location.clone(),
                )
            })
    }
}

/// Parses a literal expression. `Some(None)` stands for `undefined`.
fn parse_literal(code: &str) -> Option<Option<Variant>> {
    let code = code.trim();
    if code == "undefined" {
        return Some(None);
    }
    if code.len() >= 2 && code.starts_with('\'') && code.ends_with('\'') {
        let inner = code.get(1..code.len() - 1)?;
        return Some(Some(Variant::String(inner.replace("\\'", "'"))));
    }
    serde_json::from_str::<serde_json::Value>(code)
        .ok()
        .map(|v| Some(Variant::from(v)))
}

impl Evaluator for LiteralEvaluator {
    fn value(
        &mut self,
        pool: &ItemPool,
        item: ItemId,
        name: &str,
    ) -> EvaluationResult<Option<Variant>> {
        let mut current = Some(item);
        while let Some(id) = current {
            let Some(it) = pool.get(id) else { break };
            match it.property(name) {
                Some(Value::Variant(v)) => return Ok(Some(v.clone())),
                Some(Value::JsSource(source)) => {
                    let source = source.clone();
                    return self.evaluate_source(&source);
                }
                Some(Value::Item(_)) => return Ok(None),
                None => current = it.prototype,
            }
        }
        Ok(None)
    }

    fn property_dependencies(&self) -> PropertyDependencies {
        self.property_dependencies.clone()
    }

    fn environment(&self) -> BTreeMap<String, String> {
        self.environment.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{Item, ItemType};

    fn pool_with_source(code: &str) -> (ItemPool, ItemId) {
        let mut pool = ItemPool::new();
        let mut base = Item::new(ItemType::Product, CodeLocation::new("/p/base.qbs", 1, 1));
        base.set_property(
            "files",
            Value::JsSource(JsSourceValue::new(code, CodeLocation::new("/p/base.qbs", 2, 5))),
        );
        let base_id = pool.add(base);
        let mut derived = Item::new(ItemType::Product, CodeLocation::new("/p/app.qbs", 1, 1));
        derived.prototype = Some(base_id);
        derived.set_property("name", Value::Variant(Variant::from("app")));
        let id = pool.add(derived);
        (pool, id)
    }

    #[test]
    fn test_literal_values_follow_prototype_chain() {
        // --- Setup ---
        let (pool, id) = pool_with_source(r#"["a.cpp", "b.cpp"]"#);
        let mut evaluator = LiteralEvaluator::new();

        // --- Execute ---
        let files = evaluator.string_list_value(&pool, id, "files").unwrap();
        let name = evaluator.string_value(&pool, id, "name").unwrap();
        let missing = evaluator.value(&pool, id, "condition").unwrap();

        // --- Assert ---
        assert_eq!(files, vec!["a.cpp", "b.cpp"]);
        assert_eq!(name, "app");
        assert!(missing.is_none());
        assert!(evaluator.bool_value(&pool, id, "condition", true).unwrap());
        assert_eq!(evaluator.evaluations(), 1);
    }

    #[test]
    fn test_single_quotes_and_undefined() {
        assert_eq!(parse_literal("'it\\'s'"), Some(Some(Variant::from("it's"))));
        assert_eq!(parse_literal(" undefined "), Some(None));
        assert_eq!(parse_literal("true"), Some(Some(Variant::Bool(true))));
        assert_eq!(parse_literal("product.name + '.x'"), None);
    }

    #[test]
    fn test_non_literal_reports_location() {
        let (pool, id) = pool_with_source("base.concat(['c.cpp'])");
        let mut evaluator = LiteralEvaluator::new();

        let err = evaluator.value(&pool, id, "files").unwrap_err();

        assert_eq!(err.location.line, 2);
        assert!(err.message.contains("only literal values"));
    }

    #[test]
    fn test_file_tags_value_distinguishes_unset_from_empty() {
        let (pool, id) = pool_with_source("[]");
        let mut evaluator = LiteralEvaluator::new();

        assert_eq!(
            evaluator.file_tags_value(&pool, id, "files").unwrap(),
            Some(FileTags::new())
        );
        assert_eq!(evaluator.file_tags_value(&pool, id, "fileTags").unwrap(), None);
    }
}
