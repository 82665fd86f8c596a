//! Bundler configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::generator::{DEFAULT_GENERATION_PATH, GeneratorCacheConfig};

/// File searched for by [`BundlerConfig::discover`].
pub const DEFAULT_CONFIG_FILE: &str = "bundlepath.config.json";

/// Discoverable bundler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Directory holding generator caches, relative to the configuration directory.
    pub working_directory: String,
    /// URL prefixes bundle requests are dispatched under, in matching order.
    pub bundle_prefixes: Vec<String>,
    /// Servlet mapping serving binary resources (empty for the application root).
    pub binary_servlet_mapping: String,
    /// Whether the application runs in debug mode.
    pub debug_mode: bool,
    /// Request path serving generated content in debug mode.
    pub generation_path: String,
    /// Charset of generated text.
    pub charset: String,
    /// Cache settings of the generators that cache their output.
    pub generator_caches: Vec<GeneratorCacheConfig>,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            working_directory: ".bundlepath".into(),
            bundle_prefixes: Vec::new(),
            binary_servlet_mapping: String::new(),
            debug_mode: false,
            generation_path: DEFAULT_GENERATION_PATH.into(),
            charset: "UTF-8".into(),
            generator_caches: Vec::new(),
        }
    }
}

/// Errors that can occur while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read configuration file {}", .path.display())]
    Io {
        /// Path that caused the error.
        path: PathBuf,
        /// Source I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse the JSON configuration file.
    #[error("failed to parse configuration file {}", .path.display())]
    Parse {
        /// Path that caused the error.
        path: PathBuf,
        /// Source parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl BundlerConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// When the configuration file does not exist or fails to parse we fallback to default
    /// values so downstream callers can continue operating with sensible assumptions.
    pub fn discover(dir: &Path) -> Self {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        match Self::from_path(&candidate) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %candidate.display(), "no configuration file, using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(error = %err, "ignoring unusable configuration file");
                Self::default()
            }
        }
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Absolute working directory for a configuration found in `base_dir`.
    pub fn working_directory_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.working_directory)
    }

    /// Cache settings of the generator called `name`.
    pub fn cache_config(&self, name: &str) -> Option<&GeneratorCacheConfig> {
        self.generator_caches.iter().find(|cache| cache.name == name)
    }
}
