//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Pacing below this is allowed but likely to trip Hub rate limits
const RECOMMENDED_MIN_PACING_MS: u64 = 500;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SizeCacheConfig {
    pub cache_file: PathBuf,
    pub catalog_file: PathBuf,
    /// Delay between two remote resolutions in a batch
    pub pacing_delay_ms: u64,
    /// Save the document after every N processed entries (off when unset)
    pub checkpoint_every: Option<usize>,
    pub hub: HubConfig,
}

impl Default for SizeCacheConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            catalog_file: default_catalog_file(),
            pacing_delay_ms: default_pacing_delay_ms(),
            checkpoint_every: None,
            hub: HubConfig::default(),
        }
    }
}

/// Remote repository service settings
///
/// Credentials are deliberately absent; see [`crate::hub::HubToken`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub endpoint: String,
    pub revision: String,
    pub request_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_hub_endpoint(),
            revision: default_revision(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SizeCacheConfig {
    /// Load configuration from file with environment variable overrides
    ///
    /// Without an explicit path, `<config dir>/model-sizes/config.toml` is
    /// used when it exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| default_config_path().filter(|p| p.exists()));

        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cache_file) = env("MODEL_SIZES_CACHE_FILE") {
            self.cache_file = PathBuf::from(cache_file);
        }
        if let Some(catalog_file) = env("MODEL_SIZES_CATALOG_FILE") {
            self.catalog_file = PathBuf::from(catalog_file);
        }
        if let Some(pacing) = env("MODEL_SIZES_PACING_MS") {
            self.pacing_delay_ms = pacing
                .parse()
                .context("Invalid MODEL_SIZES_PACING_MS value")?;
        }
        if let Some(every) = env("MODEL_SIZES_CHECKPOINT_EVERY") {
            self.checkpoint_every = Some(
                every
                    .parse()
                    .context("Invalid MODEL_SIZES_CHECKPOINT_EVERY value")?,
            );
        }
        if let Some(endpoint) = env("HF_ENDPOINT") {
            self.hub.endpoint = endpoint;
        }
        if let Some(revision) = env("MODEL_SIZES_REVISION") {
            self.hub.revision = revision;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = reqwest::Url::parse(&self.hub.endpoint)
            .with_context(|| format!("Invalid hub endpoint: {}", self.hub.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!(
                "Hub endpoint must be http or https (got {})",
                self.hub.endpoint
            );
        }

        if self.hub.revision.trim().is_empty() {
            anyhow::bail!("Hub revision cannot be empty");
        }

        if self.hub.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than zero");
        }

        if self.checkpoint_every == Some(0) {
            anyhow::bail!("checkpoint_every must be at least 1 when set");
        }

        if self.cache_file.as_os_str().is_empty() {
            anyhow::bail!("Cache file path cannot be empty");
        }

        if self.pacing_delay_ms < RECOMMENDED_MIN_PACING_MS {
            tracing::warn!(
                pacing_delay_ms = self.pacing_delay_ms,
                recommended = RECOMMENDED_MIN_PACING_MS,
                "Pacing delay below recommended minimum, remote rate limits may trigger"
            );
        }

        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("model-sizes").join("config.toml"))
}

// Default functions
fn default_cache_file() -> PathBuf {
    PathBuf::from("model_sizes.json")
}
fn default_catalog_file() -> PathBuf {
    PathBuf::from("model_catalog.json")
}
fn default_pacing_delay_ms() -> u64 {
    RECOMMENDED_MIN_PACING_MS
}
fn default_hub_endpoint() -> String {
    "https://huggingface.co".to_string()
}
fn default_revision() -> String {
    "main".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
