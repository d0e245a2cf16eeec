//! Error types
//!
//! Two layers:
//! - [`SizeCacheError`] is structural. Cache load/save failures and catalog
//!   defects abort the run.
//! - [`ResolveError`] is per entry. It is captured into the size record and
//!   never propagated past the retry engine.

use std::path::PathBuf;
use thiserror::Error;

/// Structural errors that abort a reconciliation or retry run
#[derive(Debug, Error)]
pub enum SizeCacheError {
    #[error("Size cache not found at {path:?}")]
    CacheNotFound { path: PathBuf },

    #[error(
        "Size cache at {path:?} is corrupted: {reason}. Please fix or delete the file manually."
    )]
    CacheCorrupted { path: PathBuf, reason: String },

    #[error("I/O failure on {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Catalog at {path:?} is invalid: {reason}")]
    CatalogInvalid { path: PathBuf, reason: String },

    #[error("Duplicate catalog entry for key {key:?}")]
    DuplicateKey { key: String },

    #[error("Catalog {field} {value:?} clashes with the reserved key separator \"::\"")]
    ReservedSeparator { field: &'static str, value: String },
}

pub type SizeCacheResult<T> = Result<T, SizeCacheError>;

/// Classified failure of a single remote size resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Repository, revision or path does not exist, or the listing is empty
    #[error("Not found: {0}")]
    NotFound(String),

    /// Private or gated repository, or the credential was rejected
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Network failure, timeout, rate limit or server error
    #[error("Transient error: {0}")]
    Transient(String),

    /// Unclassified; message kept verbatim
    #[error("{0}")]
    Other(String),
}

impl ResolveError {
    /// Short label used in logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::Transient(_) => "transient",
            Self::Other(_) => "other",
        }
    }

    /// Whether waiting and retrying later is plausibly enough
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_display() {
        assert_eq!(
            ResolveError::NotFound("org/repo/model.safetensors".to_string()).to_string(),
            "Not found: org/repo/model.safetensors"
        );
        assert_eq!(
            ResolveError::Other("weird 418 body".to_string()).to_string(),
            "weird 418 body"
        );
    }

    #[test]
    fn test_resolve_error_kind() {
        assert_eq!(ResolveError::AccessDenied(String::new()).kind(), "access_denied");
        assert!(ResolveError::Transient(String::new()).is_transient());
        assert!(!ResolveError::NotFound(String::new()).is_transient());
    }

    #[test]
    fn test_corrupted_message_mentions_manual_fix() {
        let err = SizeCacheError::CacheCorrupted {
            path: PathBuf::from("model_sizes.json"),
            reason: "expected value at line 1 column 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupted"));
        assert!(msg.contains("fix or delete"));
    }
}
