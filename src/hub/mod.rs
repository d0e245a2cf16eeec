//! Remote repository metadata
//!
//! Provides:
//! - The [`RemoteMetadataClient`] capability (stat a path, list a directory)
//! - [`HubClient`], its Hugging Face Hub implementation
//! - [`SizeResolver`], which turns metadata into a byte size per catalog entry
//! - Bearer token discovery that never relies on values baked into source

pub mod auth;
pub mod client;
pub mod resolver;

pub use auth::{HubToken, TokenSource};
pub use client::HubClient;
pub use resolver::{Resolution, SizeResolver};

use crate::error::ResolveError;
use async_trait::async_trait;

/// Type of a repository entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Anything else the service reports (e.g. submodules); never sized
    Other,
}

/// Metadata of a single repository entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Path relative to the repository root
    pub path: String,
    pub kind: EntryKind,
    /// Byte length; zero for directories
    pub size: u64,
}

impl RemoteEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            size: 0,
        }
    }
}

/// Read-only access to a hosted repository service
///
/// Implementations classify every failure into a [`ResolveError`] and never retry.
#[async_trait]
pub trait RemoteMetadataClient: Send + Sync {
    /// Metadata of a single path inside a repository
    async fn stat(&self, repo_id: &str, path: &str) -> Result<RemoteEntry, ResolveError>;

    /// Immediate children of a path (`None` for the repository root)
    async fn list(
        &self,
        repo_id: &str,
        path: Option<&str>,
    ) -> Result<Vec<RemoteEntry>, ResolveError>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted metadata client that records every call
    #[derive(Default)]
    pub struct MockClient {
        files: Mutex<HashMap<(String, String), Result<RemoteEntry, ResolveError>>>,
        listings: Mutex<HashMap<String, Result<Vec<RemoteEntry>, ResolveError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, repo_id: &str, path: &str, size: u64) -> Self {
            self.set_stat(repo_id, path, Ok(RemoteEntry::file(path, size)));
            self
        }

        pub fn with_stat_error(self, repo_id: &str, path: &str, error: ResolveError) -> Self {
            self.set_stat(repo_id, path, Err(error));
            self
        }

        pub fn with_listing(self, repo_id: &str, entries: Vec<RemoteEntry>) -> Self {
            self.set_listing(repo_id, Ok(entries));
            self
        }

        pub fn with_listing_error(self, repo_id: &str, error: ResolveError) -> Self {
            self.set_listing(repo_id, Err(error));
            self
        }

        pub fn set_stat(
            &self,
            repo_id: &str,
            path: &str,
            result: Result<RemoteEntry, ResolveError>,
        ) {
            self.files
                .lock()
                .unwrap()
                .insert((repo_id.to_string(), path.to_string()), result);
        }

        pub fn set_listing(&self, repo_id: &str, result: Result<Vec<RemoteEntry>, ResolveError>) {
            self.listings
                .lock()
                .unwrap()
                .insert(repo_id.to_string(), result);
        }

        /// Calls in order, formatted as `stat repo/path` or `list repo`
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteMetadataClient for MockClient {
        async fn stat(&self, repo_id: &str, path: &str) -> Result<RemoteEntry, ResolveError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("stat {}/{}", repo_id, path));
            self.files
                .lock()
                .unwrap()
                .get(&(repo_id.to_string(), path.to_string()))
                .cloned()
                .unwrap_or_else(|| Err(ResolveError::NotFound(format!("{}/{}", repo_id, path))))
        }

        async fn list(
            &self,
            repo_id: &str,
            _path: Option<&str>,
        ) -> Result<Vec<RemoteEntry>, ResolveError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list {}", repo_id));
            self.listings
                .lock()
                .unwrap()
                .get(repo_id)
                .cloned()
                .unwrap_or_else(|| Err(ResolveError::NotFound(repo_id.to_string())))
        }
    }
}
