//! Size cache persistence

use crate::document::CacheDocument;
use crate::error::{SizeCacheError, SizeCacheResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Trait for storage backend operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save content to a file path atomically
    async fn save(&self, path: &Path, content: &str) -> Result<()>;

    /// Load content from a file path
    /// Returns None if file doesn't exist
    async fn load(&self, path: &Path) -> Result<Option<String>>;
}

// ============================================================================
// Production Implementation
// ============================================================================

/// Production storage backend using tokio::fs
pub struct FileSystemStorage;

impl FileSystemStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileSystemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for FileSystemStorage {
    async fn save(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create cache directory: {:?}", parent))?;
        }

        // Atomic write: write to temp file, then rename
        let temp_file = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_file)
            .await
            .context("Failed to create temp cache file")?;
        file.write_all(content.as_bytes())
            .await
            .context("Failed to write cache file")?;
        file.sync_all().await.context("Failed to sync cache file")?;

        fs::rename(&temp_file, path)
            .await
            .context("Failed to rename temp cache file")?;

        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read cache file: {:?}", path)),
        }
    }
}

// ============================================================================
// Size Cache Store with Dependency Injection
// ============================================================================

/// Loads and saves the size cache document as a whole
pub struct SizeCacheStore {
    cache_file: PathBuf,
    storage: Arc<dyn StorageBackend>,
}

impl SizeCacheStore {
    /// Create a store with a custom storage backend
    pub fn new_with_storage(cache_file: PathBuf, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            cache_file,
            storage,
        }
    }

    /// Create a store backed by the local filesystem
    pub fn new(cache_file: PathBuf) -> Self {
        Self::new_with_storage(cache_file, Arc::new(FileSystemStorage::new()))
    }

    pub fn path(&self) -> &Path {
        &self.cache_file
    }

    /// Load the cache document
    ///
    /// An absent file is [`SizeCacheError::CacheNotFound`]; unparseable content
    /// is [`SizeCacheError::CacheCorrupted`] and must be fixed by hand.
    pub async fn load(&self) -> SizeCacheResult<CacheDocument> {
        let content = self
            .storage
            .load(&self.cache_file)
            .await
            .map_err(|e| SizeCacheError::Io {
                path: self.cache_file.clone(),
                message: format!("{:#}", e),
            })?;

        let Some(content) = content else {
            return Err(SizeCacheError::CacheNotFound {
                path: self.cache_file.clone(),
            });
        };

        let document: CacheDocument =
            serde_json::from_str(&content).map_err(|e| SizeCacheError::CacheCorrupted {
                path: self.cache_file.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            path = ?self.cache_file,
            models = document.len(),
            fetch_date = %document.fetch_date,
            "Size cache loaded"
        );

        Ok(document)
    }

    /// Load the cache document, or start an empty one if none exists yet
    ///
    /// Corrupted caches still fail.
    pub async fn load_or_new(&self) -> SizeCacheResult<CacheDocument> {
        match self.load().await {
            Err(SizeCacheError::CacheNotFound { .. }) => {
                tracing::info!(path = ?self.cache_file, "No size cache found, starting fresh");
                Ok(CacheDocument::new())
            }
            other => other,
        }
    }

    /// Replace the persisted document
    pub async fn save(&self, document: &CacheDocument) -> SizeCacheResult<()> {
        let json = serde_json::to_string_pretty(document).map_err(|e| SizeCacheError::Io {
            path: self.cache_file.clone(),
            message: format!("Failed to serialize size cache: {}", e),
        })?;

        self.storage
            .save(&self.cache_file, &json)
            .await
            .map_err(|e| SizeCacheError::Io {
                path: self.cache_file.clone(),
                message: format!("{:#}", e),
            })?;

        tracing::debug!(
            path = ?self.cache_file,
            models = document.len(),
            "Size cache saved"
        );

        Ok(())
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
