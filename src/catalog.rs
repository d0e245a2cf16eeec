//! Model catalog input
//!
//! The catalog is an externally supplied nested structure:
//!
//! ```text
//! {
//!   "<category>": {
//!     "sub_categories": {
//!       "<sub_category>": {
//!         "models": [ { "name", "repo_id", "filename_in_repo", "is_snapshot" }, ... ]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Order is preserved at every level so reports are reproducible.

use crate::error::{SizeCacheError, SizeCacheResult};
use crate::key::{derive_key, is_key_component};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A model as listed inside a sub-category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogModel {
    pub name: String,
    pub repo_id: String,
    #[serde(default, alias = "filename_in_repo")]
    pub filename: Option<String>,
    #[serde(default)]
    pub is_snapshot: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubCategory {
    #[serde(default)]
    pub models: Vec<CatalogModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub sub_categories: IndexMap<String, SubCategory>,
}

/// A catalog entry with its position in the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub category: String,
    pub sub_category: String,
    pub name: String,
    pub repo_id: String,
    pub filename: Option<String>,
    pub is_snapshot: bool,
}

impl CatalogEntry {
    /// Canonical cache key of this entry
    pub fn key(&self) -> String {
        derive_key(&self.category, &self.sub_category, &self.name)
    }

    /// File to size, or `None` to sum the whole repository
    pub fn target_file(&self) -> Option<&str> {
        if self.is_snapshot {
            None
        } else {
            self.filename.as_deref()
        }
    }

    fn check_separator(&self) -> SizeCacheResult<()> {
        for (field, value) in [
            ("category", &self.category),
            ("sub-category", &self.sub_category),
            ("model name", &self.name),
        ] {
            if !is_key_component(value) {
                return Err(SizeCacheError::ReservedSeparator {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The full model catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub categories: IndexMap<String, Category>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from its JSON form
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Load a catalog JSON file
    pub async fn load(path: &Path) -> SizeCacheResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SizeCacheError::CatalogInvalid {
                path: path.to_path_buf(),
                reason: format!("cannot read file: {}", e),
            })?;

        let catalog =
            Self::from_json_str(&content).map_err(|e| SizeCacheError::CatalogInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            path = ?path,
            categories = catalog.categories.len(),
            entries = catalog.len(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    /// Append a model under the given category and sub-category
    pub fn push(&mut self, category: &str, sub_category: &str, model: CatalogModel) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .sub_categories
            .entry(sub_category.to_string())
            .or_default()
            .models
            .push(model);
    }

    /// Number of model entries across all categories
    pub fn len(&self) -> usize {
        self.categories
            .values()
            .flat_map(|c| c.sub_categories.values())
            .map(|s| s.models.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries flattened in catalog order
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries = Vec::with_capacity(self.len());
        for (category, cat) in &self.categories {
            for (sub_category, sub) in &cat.sub_categories {
                for model in &sub.models {
                    entries.push(CatalogEntry {
                        category: category.clone(),
                        sub_category: sub_category.clone(),
                        name: model.name.clone(),
                        repo_id: model.repo_id.clone(),
                        filename: model.filename.clone(),
                        is_snapshot: model.is_snapshot,
                    });
                }
            }
        }
        entries
    }

    /// Entries keyed by canonical key, in catalog order
    ///
    /// Fails on the first field containing the reserved separator or the
    /// first duplicate key. Both are catalog authoring defects.
    pub fn keyed_entries(&self) -> SizeCacheResult<IndexMap<String, CatalogEntry>> {
        let mut keyed = IndexMap::with_capacity(self.len());
        for entry in self.entries() {
            entry.check_separator()?;
            match keyed.entry(entry.key()) {
                Entry::Occupied(slot) => {
                    return Err(SizeCacheError::DuplicateKey {
                        key: slot.key().clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
            }
        }
        Ok(keyed)
    }
}
