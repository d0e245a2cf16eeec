//! Persisted size document
//!
//! ```json
//! {
//!   "models": {
//!     "<category>::<sub_category>::<name>": {
//!       "name": "...", "repo_id": "...", "filename": "...", "is_snapshot": false,
//!       "size_bytes": 2147483648, "size_gb": 2.0
//!     }
//!   },
//!   "fetch_timestamp": 1718000000.5,
//!   "fetch_date": "2024-06-10 08:13:20"
//! }
//! ```
//!
//! A record carries `error` if and only if its last resolution failed, in which
//! case both size fields are zero. Fields this crate does not know about are
//! kept as-is.

use crate::catalog::CatalogEntry;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Slack for stored `size_gb` values, one rounding step plus float noise
const SIZE_GB_TOLERANCE: f64 = 0.015;

/// Format of the human-readable `fetch_date`
pub const FETCH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert bytes to GB (1024³) rounded to 2 decimals, ties to even
pub fn bytes_to_gb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 100.0).round_ties_even() / 100.0
}

/// Blank error text counts as no error
fn non_empty_error<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let error = Option::<String>::deserialize(deserializer)?;
    Ok(error.filter(|e| !e.trim().is_empty()))
}

/// Cached size information for one catalog key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub is_snapshot: bool,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub size_gb: f64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_error"
    )]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Violation of the error/size invariant found in a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inconsistency {
    /// `error` is set but `size_bytes` is nonzero
    ErrorWithSize,
    /// `size_bytes` is zero but no `error` explains it
    ZeroSizeWithoutError,
    /// `size_gb` does not match `size_bytes`
    SizeMismatch,
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorWithSize => write!(f, "error recorded alongside a nonzero size"),
            Self::ZeroSizeWithoutError => write!(f, "zero size without an error"),
            Self::SizeMismatch => write!(f, "size_gb does not match size_bytes"),
        }
    }
}

impl SizeRecord {
    /// Record for a catalog entry that has not been resolved yet
    ///
    /// Callers must apply an outcome with [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure) before storing it.
    pub fn unresolved(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            repo_id: Some(entry.repo_id.clone()),
            filename: entry.filename.clone(),
            is_snapshot: entry.is_snapshot,
            size_bytes: 0,
            size_gb: 0.0,
            error: None,
            extra: Map::new(),
        }
    }

    /// Repository to query, if the record has a usable one
    pub fn repository(&self) -> Option<&str> {
        self.repo_id.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// File to size, or `None` to sum the whole repository
    pub fn target_file(&self) -> Option<&str> {
        if self.is_snapshot {
            None
        } else {
            self.filename.as_deref()
        }
    }

    /// Store a resolved size; both size fields change together and `error` is removed
    pub fn record_success(&mut self, size_bytes: u64) {
        self.size_bytes = size_bytes;
        self.size_gb = bytes_to_gb(size_bytes);
        self.error = None;
    }

    /// Store a failure, replacing any earlier error text
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.size_bytes = 0;
        self.size_gb = 0.0;
        self.error = Some(error.into());
    }

    /// Whether the record needs another resolution attempt
    pub fn is_failed(&self) -> bool {
        self.error.is_some() || self.size_bytes == 0
    }

    /// Cross-check the error/size invariant
    pub fn consistency(&self) -> Option<Inconsistency> {
        match (&self.error, self.size_bytes) {
            (Some(_), bytes) if bytes > 0 => Some(Inconsistency::ErrorWithSize),
            (None, 0) => Some(Inconsistency::ZeroSizeWithoutError),
            _ if (bytes_to_gb(self.size_bytes) - self.size_gb).abs() > SIZE_GB_TOLERANCE => {
                Some(Inconsistency::SizeMismatch)
            }
            _ => None,
        }
    }
}

/// The whole size cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub models: IndexMap<String, SizeRecord>,
    #[serde(default)]
    pub fetch_timestamp: f64,
    #[serde(default)]
    pub fetch_date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheDocument {
    /// Empty document, used when no cache exists yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SizeRecord> {
        self.models.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut SizeRecord> {
        self.models.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.models.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Keys whose record needs another resolution, in document order
    pub fn failed_keys(&self) -> Vec<String> {
        self.models
            .iter()
            .filter(|(_, record)| record.is_failed())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Insert a record under a new key; existing records are never replaced
    ///
    /// Returns `false` if the key was already present.
    pub fn insert_new(&mut self, key: String, record: SizeRecord) -> bool {
        match self.models.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Stamp `fetch_timestamp` (epoch seconds) and `fetch_date` (local time)
    pub fn touch(&mut self) {
        let now = chrono::Utc::now();
        self.fetch_timestamp = now.timestamp_micros() as f64 / 1_000_000.0;
        self.fetch_date = now
            .with_timezone(&chrono::Local)
            .format(FETCH_DATE_FORMAT)
            .to_string();
    }
}
