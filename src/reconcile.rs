//! Catalog / cache reconciliation
//!
//! Compares the keys the catalog expects with the keys the cache holds:
//! - `missing`: catalog entries with no cache record
//! - `extra`: cache records no catalog entry maps to (orphans, often renames)
//! - `failed`: cache records carrying an error or a zero size
//!
//! Reconciliation only reads. Orphans are removed solely through the explicit
//! [`prune_orphans`] operation.

use crate::catalog::{Catalog, CatalogEntry};
use crate::document::{CacheDocument, Inconsistency};
use crate::error::SizeCacheResult;
use indexmap::IndexMap;
use serde::Serialize;

/// Number of leading name characters used to look for renamed entries
const SIMILAR_PREFIX_CHARS: usize = 20;

/// A catalog entry with no record in the cache
#[derive(Debug, Clone, PartialEq)]
pub struct MissingEntry {
    pub key: String,
    pub entry: CatalogEntry,
}

/// A cache record that breaks the error/size invariant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InconsistentRecord {
    pub key: String,
    pub kind: Inconsistency,
}

/// Result of comparing a catalog with a cache document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    /// Number of keys the catalog expects
    pub expected: usize,
    /// Number of records in the cache
    pub cached: usize,
    /// Catalog entries absent from the cache, in catalog order
    pub missing: Vec<MissingEntry>,
    /// Cache keys without a catalog entry, in cache order
    pub extra: Vec<String>,
    /// Cache keys needing another resolution, in cache order
    pub failed: Vec<String>,
    /// Catalog keys that are cached but failed (subset of `failed`)
    pub stale: Vec<String>,
    /// Records whose error and size fields disagree
    pub inconsistent: Vec<InconsistentRecord>,
}

impl DiffReport {
    /// Catalog entries that are cached with a usable size
    pub fn present(&self) -> usize {
        self.expected - self.missing.len() - self.stale.len()
    }

    /// Catalog and cache agree and every record has a size
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.extra.is_empty()
            && self.failed.is_empty()
            && self.inconsistent.is_empty()
    }
}

/// Result of a diagnostic key search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Matching catalog keys and whether each one is cached
    pub expected: Vec<(String, bool)>,
    /// Matching cache keys
    pub cached: Vec<String>,
}

/// Read-only view pairing a validated catalog with a cache document
pub struct Reconciler<'a> {
    expected: IndexMap<String, CatalogEntry>,
    document: &'a CacheDocument,
}

impl<'a> Reconciler<'a> {
    /// Validate the catalog and bind it to a document
    ///
    /// Fails on duplicate keys or reserved separators in the catalog.
    pub fn new(catalog: &Catalog, document: &'a CacheDocument) -> SizeCacheResult<Self> {
        Ok(Self {
            expected: catalog.keyed_entries()?,
            document,
        })
    }

    /// Expected keys with their catalog entries, in catalog order
    pub fn expected(&self) -> &IndexMap<String, CatalogEntry> {
        &self.expected
    }

    pub fn document(&self) -> &'a CacheDocument {
        self.document
    }

    /// Compute the diff report
    pub fn reconcile(&self) -> DiffReport {
        let missing: Vec<MissingEntry> = self
            .expected
            .iter()
            .filter(|(key, _)| !self.document.contains(key))
            .map(|(key, entry)| MissingEntry {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect();

        let mut extra = Vec::new();
        let mut failed = Vec::new();
        let mut stale = Vec::new();
        let mut inconsistent = Vec::new();

        for (key, record) in &self.document.models {
            let is_expected = self.expected.contains_key(key);
            if !is_expected {
                extra.push(key.clone());
            }
            if record.is_failed() {
                failed.push(key.clone());
                if is_expected {
                    stale.push(key.clone());
                }
            }
            if let Some(kind) = record.consistency() {
                inconsistent.push(InconsistentRecord {
                    key: key.clone(),
                    kind,
                });
            }
        }

        let report = DiffReport {
            expected: self.expected.len(),
            cached: self.document.len(),
            missing,
            extra,
            failed,
            stale,
            inconsistent,
        };

        tracing::info!(
            expected = report.expected,
            cached = report.cached,
            missing = report.missing.len(),
            extra = report.extra.len(),
            failed = report.failed.len(),
            inconsistent = report.inconsistent.len(),
            "Reconciliation complete"
        );

        for record in &report.inconsistent {
            tracing::warn!(
                key = %record.key,
                problem = %record.kind,
                "Size record violates the error/size invariant"
            );
        }

        report
    }

    /// Case-insensitive substring search over expected and cached keys
    pub fn search(&self, term: &str) -> SearchResults {
        let needle = term.to_lowercase();

        let expected = self
            .expected
            .keys()
            .filter(|key| key.to_lowercase().contains(&needle))
            .map(|key| (key.clone(), self.document.contains(key)))
            .collect();

        let cached = self
            .document
            .models
            .keys()
            .filter(|key| key.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        SearchResults { expected, cached }
    }

    /// Cache keys that look like a renamed form of `entry`
    ///
    /// Matches cache keys that contain the first 20 characters of the name.
    pub fn similar_keys(&self, entry: &CatalogEntry) -> Vec<&'a str> {
        let prefix: String = entry.name.chars().take(SIMILAR_PREFIX_CHARS).collect();
        if prefix.is_empty() {
            return Vec::new();
        }

        self.document
            .models
            .keys()
            .filter(|key| key.contains(&prefix))
            .map(String::as_str)
            .collect()
    }
}

/// Reconcile a catalog against a cache document
pub fn reconcile(catalog: &Catalog, document: &CacheDocument) -> SizeCacheResult<DiffReport> {
    Ok(Reconciler::new(catalog, document)?.reconcile())
}

/// Remove the given orphaned keys from the document
///
/// Returns the keys that were actually removed. Order of the remaining
/// records is kept.
pub fn prune_orphans(document: &mut CacheDocument, orphans: &[String]) -> Vec<String> {
    let mut removed = Vec::with_capacity(orphans.len());
    for key in orphans {
        if document.models.shift_remove(key).is_some() {
            tracing::info!(key = %key, "Pruned orphaned size record");
            removed.push(key.clone());
        }
    }
    removed
}
