//! Catalog configuration
//!
//! Loaded from `config.yaml` in the platform config directory, or from an
//! explicit path. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::catalog::bundle::DEFAULT_BUNDLES;
use crate::catalog::discovery::KnownFiles;
use crate::catalog::fetch::DEFAULT_TIMEOUT_SECS;
use crate::error::{CatalogError, Result};

/// File name of the configuration inside the config directory
pub const CONFIG_FILE: &str = "config.yaml";

/// Catalog configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Bundles to load, in display order
    pub bundles: Vec<String>,

    /// Branch raw sources are read from when published
    pub branch: String,

    /// Owner used when the page hostname carries none
    pub default_owner: String,

    /// Repository used when the page path carries none
    pub default_repo: String,

    /// Hostname suffix that marks a published deployment
    pub hosting_suffix: String,

    /// Root that local-mode paths hang from (empty for the catalog root)
    pub local_root: String,

    /// Per-request timeout for HTTP fetches
    pub request_timeout_secs: u64,

    /// Regenerated known-files table replacing the built-in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_files: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bundles: DEFAULT_BUNDLES.iter().map(|b| b.to_string()).collect(),
            branch: "main".to_string(),
            default_owner: "Windsurf-Samples".to_string(),
            default_repo: "cascade-customizations-catalog".to_string(),
            hosting_suffix: "github.io".to_string(),
            local_root: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            known_files: None,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path()?)
    }

    /// Load configuration from a specific path, defaulting when it is absent
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_yaml_ng::from_str(&content).map_err(|e| {
            CatalogError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;

        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as YAML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| {
            CatalogError::Config(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// `config.yaml` in the platform config directory
    pub fn default_config_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("com", "windsurf", "cascade-catalog")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("cascade-catalog")))
            .map(|dir| dir.join(CONFIG_FILE))
            .ok_or_else(|| CatalogError::Config("could not determine config directory".into()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(CatalogError::Config(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.hosting_suffix.trim().is_empty() {
            return Err(CatalogError::Config("hosting_suffix must not be empty".into()));
        }
        if self.branch.trim().is_empty() {
            return Err(CatalogError::Config("branch must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured known-files table, or the built-in one
    pub fn known_files(&self) -> Result<KnownFiles> {
        match &self.known_files {
            Some(path) => KnownFiles::load(path),
            None => Ok(KnownFiles::default()),
        }
    }
}
