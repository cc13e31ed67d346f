// src/core/loader_result.rs

//! What the item loader hands to the resolver: the item tree plus the
//! per-product information it gathered while loading modules.

use crate::core::error_info::ErrorInfo;
use crate::core::item::{ItemId, ItemPool, QualifiedId};
use crate::core::variant::VariantMap;
use crate::models::{FileTags, Probe, ResolvedProduct};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One `Depends` on another product, as recorded by the loader.
///
/// Exactly one of `product_types` and `name` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDependency {
    /// Depend on every product whose type intersects these tags.
    pub product_types: FileTags,
    pub name: String,
    /// `"*"` matches every profile; empty matches any.
    pub profile: String,
    pub multiplex_configuration_id: String,
    pub limit_to_sub_project: bool,
    pub is_required: bool,
    pub parameters: VariantMap,
}

impl Default for ProductDependency {
    fn default() -> Self {
        Self {
            product_types: FileTags::new(),
            name: String::new(),
            profile: String::new(),
            multiplex_configuration_id: String::new(),
            limit_to_sub_project: false,
            is_required: true,
            parameters: VariantMap::new(),
        }
    }
}

impl ProductDependency {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn by_type(tags: FileTags) -> Self {
        Self {
            product_types: tags,
            ..Self::default()
        }
    }

    pub fn unique_name(&self) -> String {
        ResolvedProduct::unique_name_of(&self.name, &self.multiplex_configuration_id)
    }
}

/// Loader findings about one product item.
#[derive(Debug, Clone, Default)]
pub struct ProductInfo {
    pub used_products: Vec<ProductDependency>,
    /// Module properties bound directly inside each group item.
    pub module_properties_set_in_groups: HashMap<ItemId, BTreeSet<QualifiedId>>,
    /// An error the loader hit but deferred, so that relaxed mode can skip the product.
    pub delayed_error: Option<ErrorInfo>,
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleLoaderResult {
    pub item_pool: ItemPool,
    pub root: Option<ItemId>,
    pub product_infos: HashMap<ItemId, ProductInfo>,
    /// Every description file that contributed to the tree.
    pub qbs_files: BTreeSet<String>,
    pub project_probes: Vec<Probe>,
    pub profile_configs: BTreeMap<String, VariantMap>,
}
