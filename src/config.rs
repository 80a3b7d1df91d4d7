use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::utils::analysis::PageRank;

/// Name of the project-level configuration file.
pub const CONFIG_FILE: &str = "compass.toml";

/// Output format for the rendered map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// What to index and how to walk it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Project root
    pub path: PathBuf,
    /// Glob patterns to skip, on top of .gitignore
    pub ignore_patterns: Vec<String>,
    /// Files larger than this many bytes are not indexed
    pub max_file_size: Option<u64>,
    /// Extra directories that act as import roots, e.g. "src"
    pub source_roots: Vec<String>,
    /// Worker threads for extraction; rayon's default when unset
    pub threads: Option<usize>,
}

/// Rendering limits and destination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_format: OutputFormat,
    /// Write the map here instead of stdout
    pub output: Option<PathBuf>,
    pub max_tokens: Option<usize>,
    pub max_files: Option<usize>,
    pub max_symbols_per_file: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub use_cache: bool,
    /// Relative paths are taken from the project root
    pub cache_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_dir: PathBuf::from(".compass"),
        }
    }
}

/// Main configuration for compass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    pub scan: ScanConfig,
    pub ranking: PageRank,
    pub output: OutputConfig,
    pub cache: CacheConfig,
    /// Print progress events to stderr
    pub verbose: bool,
}

impl CompassConfig {
    /// Validates the configuration, ensuring the path exists and ranking
    /// parameters are usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.scan.path.exists() {
            anyhow::bail!("Path does not exist: {:?}", self.scan.path);
        }
        let damping = self.ranking.damping;
        if !(0.0..1.0).contains(&damping) {
            anyhow::bail!("Damping factor must be in [0, 1), got {}", damping);
        }
        if self.ranking.tolerance.is_nan() || self.ranking.tolerance <= 0.0 {
            anyhow::bail!(
                "Convergence tolerance must be positive, got {}",
                self.ranking.tolerance
            );
        }
        if self.ranking.max_iterations == 0 {
            anyhow::bail!("Iteration cap must be at least 1");
        }
        if self.scan.threads == Some(0) {
            anyhow::bail!("Thread count must be at least 1");
        }
        Ok(())
    }

    /// Attempts to load configuration from `compass.toml` in the current directory.
    pub fn load_from_file() -> Option<Self> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            return None;
        }
        match Self::load_from(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring {}: {:#}", CONFIG_FILE, e);
                None
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Cache directory resolved against the project root.
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache.cache_dir.is_absolute() {
            self.cache.cache_dir.clone()
        } else {
            self.scan.path.join(&self.cache.cache_dir)
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        let defaults = vec![
            // Version Control
            ".git",
            ".hg",
            ".svn",
            ".bzr",
            // IDEs
            ".idea",
            ".vscode",
            // Virtual environments
            "venv",
            ".venv",
            "env",
            ".env",
            ".tox",
            ".nox",
            "site-packages",
            // Caches
            "__pycache__",
            ".mypy_cache",
            ".pytest_cache",
            ".ruff_cache",
            ".compass",
            // Build output
            "build",
            "dist",
            "*.egg-info",
            "node_modules",
        ];

        Self {
            path: PathBuf::from("."),
            ignore_patterns: defaults.into_iter().map(String::from).collect(),
            max_file_size: Some(1024 * 1024),
            source_roots: Vec::new(),
            threads: None,
        }
    }
}
