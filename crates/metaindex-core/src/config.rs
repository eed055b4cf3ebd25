//! Configuration for metaindex builds and queries.
//!
//! Values are layered: built-in defaults, then an optional
//! `.metaindex.yaml` in the repository root, then command-line flags.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the per-repository configuration file.
pub const CONFIG_FILE_NAME: &str = ".metaindex.yaml";

/// Directory names that are never traversed.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    "dist",
    "build",
    "target",
    ".cache",
    ".codex-index",
];

/// How a build treats the prior state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Reuse records whose fingerprint is unchanged.
    #[default]
    Incremental,
    /// Ignore prior state and reclassify everything.
    Full,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Incremental => "incremental",
            BuildMode::Full => "full",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(BuildMode::Incremental),
            "full" => Ok(BuildMode::Full),
            other => Err(CoreError::InvalidValue {
                field: "mode",
                message: format!("expected 'incremental' or 'full', got '{}'", other),
            }),
        }
    }
}

/// Index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index directory, absolute or relative to the repository root
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Build mode
    #[serde(default)]
    pub mode: BuildMode,

    /// Maximum files examined per build
    #[serde(default = "default_max_files_per_run")]
    pub max_files_per_run: u64,

    /// Wall-clock budget per build, in seconds
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,

    /// Byte budget for content probes
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,

    /// Extra directory names to exclude, on top of [`DEFAULT_EXCLUDES`]
    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Write one record segment per top-level directory
    #[serde(default)]
    pub sharded: bool,

    /// Default row limit for queries
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(".codex-index")
}

fn default_max_files_per_run() -> u64 {
    12_000
}

fn default_max_seconds() -> u64 {
    25
}

fn default_max_read_bytes() -> u64 {
    64 * 1024 * 1024 // 64MB
}

fn default_query_limit() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            mode: BuildMode::default(),
            max_files_per_run: default_max_files_per_run(),
            max_seconds: default_max_seconds(),
            max_read_bytes: default_max_read_bytes(),
            exclude_dirs: Vec::new(),
            sharded: false,
            query_limit: default_query_limit(),
            log_level: default_log_level(),
        }
    }
}

impl IndexConfig {
    /// Load `.metaindex.yaml` from the repository root, falling back to defaults
    pub fn load(repo_root: &Path) -> Self {
        Self::try_load(repo_root).unwrap_or_else(|e| {
            tracing::warn!("{}", fallback_message(&e));
            Self::default()
        })
    }

    /// Like [`IndexConfig::load`], but hands a broken file back to the caller
    /// instead of logging it. A missing file still yields the defaults.
    pub fn try_load(repo_root: &Path) -> Result<Self, CoreError> {
        let config_path = repo_root.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve the index directory against the repository root.
    pub fn resolve_index_dir(&self, repo_root: &Path) -> PathBuf {
        resolve_against(repo_root, &self.index_dir)
    }

    /// The full set of excluded directory names for a build writing into
    /// `index_dir`: defaults, configured extras and the index directory's own name.
    pub fn effective_excludes(&self, index_dir: &Path) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        names.extend(
            self.exclude_dirs
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        if let Some(name) = index_dir.file_name().and_then(|n| n.to_str()) {
            names.insert(name.to_string());
        }
        names
    }
}

/// Warning logged when a configuration file is ignored in favour of defaults.
pub fn fallback_message(error: &CoreError) -> String {
    match error {
        CoreError::Config { path, message } => {
            format!("Failed to parse config file {}: {}", path.display(), message)
        }
        other => format!("Failed to read config file: {}", other),
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
