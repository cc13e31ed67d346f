// src/core/property_map.rs

//! # Property Maps
//!
//! A [`PropertyMap`] is the evaluated snapshot of a product's module
//! properties, laid out as `module name -> property -> value`.
//!
//! ## Sharing
//!
//! Maps are handed around as `Arc<PropertyMap>` and are never mutated once
//! shared. A group that overrides some module properties gets a brand-new map;
//! groups that override nothing keep pointing at their parent's instance. Use
//! [`Arc::make_mut`] when a private copy has to be edited.
//!
//! ## Property dependencies
//!
//! The evaluator reports which properties read which other properties. When a
//! group sets `cpp.defines`, every property that (transitively) depends on it
//! must be re-evaluated as well; [`properties_to_evaluate`] computes that set.

use crate::constants::QBS_MODULE;
use crate::core::item::QualifiedId;
use crate::core::variant::{Variant, VariantMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Maps a property to the set of properties whose values were computed from it.
pub type PropertyDependencies = HashMap<QualifiedId, BTreeSet<QualifiedId>>;

/// An evaluated, read-only snapshot of module property values.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    value: VariantMap,
}

impl PropertyMap {
    pub fn new(value: VariantMap) -> Self {
        Self { value }
    }

    /// Wraps a freshly built map for sharing.
    pub fn shared(value: VariantMap) -> Arc<Self> {
        Arc::new(Self::new(value))
    }

    pub fn value(&self) -> &VariantMap {
        &self.value
    }

    /// Replaces the whole map. Only reachable on an unshared instance.
    pub fn set_value(&mut self, value: VariantMap) {
        self.value = value;
    }

    /// All properties of one module, if the module is configured.
    pub fn module_values(&self, module: &str) -> Option<&VariantMap> {
        self.value.get(module).and_then(Variant::as_map)
    }

    /// Looks up `module.key`.
    ///
    /// `None` means the module or the property is not present at all, as
    /// opposed to `Some(Variant::Null)` for a property explicitly left empty.
    pub fn module_property(&self, module: &str, key: &str) -> Option<&Variant> {
        self.module_values(module).and_then(|m| m.get(key))
    }

    /// Shortcut for properties of the `qbs` module.
    pub fn qbs_property_value(&self, key: &str) -> Option<&Variant> {
        self.module_property(QBS_MODULE, key)
    }

    /// Follows a path of keys through nested maps.
    pub fn property(&self, path: &[&str]) -> Option<&Variant> {
        let (first, rest) = path.split_first()?;
        let mut current = self.value.get(*first)?;
        for key in rest {
            current = current.as_map()?.get(*key)?;
        }
        Some(current)
    }

    /// Renders the map as a JSON object literal, mostly for diagnostics.
    pub fn to_json_literal(&self) -> String {
        serde_json::Value::from(&Variant::Map(self.value.clone())).to_string()
    }
}

impl fmt::Display for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_literal())
    }
}

/// Expands `initial` with every property that depends on one of its members.
///
/// Walks the dependency graph breadth-first; each property is visited once,
/// so cyclic dependency reports cannot loop.
pub fn properties_to_evaluate(
    initial: impl IntoIterator<Item = QualifiedId>,
    dependencies: &PropertyDependencies,
) -> BTreeSet<QualifiedId> {
    let mut queue: VecDeque<QualifiedId> = initial.into_iter().collect();
    let mut result = BTreeSet::new();
    while let Some(property) = queue.pop_front() {
        if !result.insert(property.clone()) {
            continue;
        }
        if let Some(dependents) = dependencies.get(&property) {
            queue.extend(dependents.iter().filter(|d| !result.contains(*d)).cloned());
        }
    }
    result
}

/// Groups qualified property names by module: `["cpp", "defines"]` lands
/// under `"cpp"`, `["Qt", "core", "config"]` under `"Qt.core"`.
pub fn group_by_module(properties: &BTreeSet<QualifiedId>) -> BTreeMap<String, BTreeSet<String>> {
    let mut per_module: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for property in properties {
        if let Some((name, module)) = property.split_last() {
            if module.is_empty() {
                continue;
            }
            per_module
                .entry(module.join("."))
                .or_default()
                .insert(name.clone());
        }
    }
    per_module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::qualified_id;

    fn sample_map() -> VariantMap {
        let mut cpp = VariantMap::new();
        cpp.insert("defines".into(), Variant::from(vec!["A".to_string()]));
        cpp.insert("warningLevel".into(), Variant::Null);
        let mut qbs = VariantMap::new();
        qbs.insert("install".into(), Variant::Bool(true));
        let mut root = VariantMap::new();
        root.insert("cpp".into(), Variant::Map(cpp));
        root.insert("qbs".into(), Variant::Map(qbs));
        root
    }

    #[test]
    fn test_lookup_distinguishes_absent_from_null() {
        let map = PropertyMap::new(sample_map());

        assert_eq!(map.module_property("cpp", "warningLevel"), Some(&Variant::Null));
        assert_eq!(map.module_property("cpp", "optimization"), None);
        assert_eq!(map.module_property("java", "defines"), None);
        assert_eq!(map.qbs_property_value("install"), Some(&Variant::Bool(true)));
        assert_eq!(
            map.property(&["cpp", "defines"]),
            Some(&Variant::from(vec!["A".to_string()]))
        );
        assert_eq!(map.property(&[]), None);
    }

    #[test]
    fn test_mutating_a_clone_leaves_the_original_untouched() {
        // --- Setup ---
        let original = PropertyMap::shared(sample_map());
        let mut copy = Arc::clone(&original);

        // --- Execute ---
        let mut changed = copy.value().clone();
        changed.remove("qbs");
        Arc::make_mut(&mut copy).set_value(changed);

        // --- Assert ---
        assert!(original.value().contains_key("qbs"));
        assert!(!copy.value().contains_key("qbs"));
        assert!(!Arc::ptr_eq(&original, &copy));
    }

    #[test]
    fn test_properties_to_evaluate_follows_transitive_dependents() {
        // --- Setup ---
        let mut deps = PropertyDependencies::new();
        deps.insert(
            qualified_id("cpp.defines"),
            [qualified_id("cpp.compilerFlags")].into_iter().collect(),
        );
        deps.insert(
            qualified_id("cpp.compilerFlags"),
            [qualified_id("cpp.commandLine"), qualified_id("cpp.defines")]
                .into_iter()
                .collect(),
        );

        // --- Execute ---
        let result = properties_to_evaluate([qualified_id("cpp.defines")], &deps);

        // --- Assert ---
        assert_eq!(result.len(), 3);
        assert!(result.contains(&qualified_id("cpp.commandLine")));

        let per_module = group_by_module(&result);
        assert_eq!(per_module.len(), 1);
        assert_eq!(per_module.get("cpp").map(BTreeSet::len), Some(3));
    }
}
