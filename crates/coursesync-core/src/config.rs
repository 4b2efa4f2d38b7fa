//! Configuration module for coursesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Name of the folder the catalog creates in every course by default.
/// Its contents are mirrored directly into the course directory.
pub const DEFAULT_FOLDER_NAME: &str = "Allgemeiner Dateiordner";

/// Default directory layout below the sync root.
pub const DEFAULT_PATH_TEMPLATE: &str = ":semester/:course";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for coursesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub concurrency: ConcurrencyConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory for the local mirror.
    pub root: PathBuf,
    /// Directory layout per course, e.g. `:sem/:lecture/:type`.
    pub path_template: String,
    /// Folder name whose contents merge into the parent instead of
    /// producing a directory of their own.
    pub default_folder_name: String,
    /// Replace changed files in place instead of keeping `_vN` copies.
    pub overwrite: bool,
    /// Sync every semester, not only the one running right now.
    pub include_all_semesters: bool,
    /// Where the snapshot tree is persisted.
    pub snapshot_file: PathBuf,
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Number of concurrent units per run. `0` uses the available parallelism.
    pub workers: usize,
}

impl ConcurrencyConfig {
    /// Effective pool size for one run
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/coursesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("coursesync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("coursesync");
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Courses"),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            default_folder_name: DEFAULT_FOLDER_NAME.to_string(),
            overwrite: false,
            include_all_semesters: false,
            snapshot_file: data_dir.join("snapshot.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.path_template"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Placeholders in
    /// the path template are checked when the template is parsed.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // Tilde paths are expanded at runtime.
        let root_str = self.sync.root.to_string_lossy();
        if !root_str.starts_with('~') && self.sync.root.is_relative() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("must be an absolute path: {}", self.sync.root.display()),
            });
        }
        if self.sync.path_template.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.path_template".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.default_folder_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.default_folder_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.snapshot_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.snapshot_file".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use coursesync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Courses"))
///     .path_template(":sem/:lecture/:type")
///     .overwrite(true)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn path_template(mut self, template: impl Into<String>) -> Self {
        self.config.sync.path_template = template.into();
        self
    }

    pub fn default_folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.sync.default_folder_name = name.into();
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.config.sync.overwrite = overwrite;
        self
    }

    pub fn include_all_semesters(mut self, include: bool) -> Self {
        self.config.sync.include_all_semesters = include;
        self
    }

    pub fn snapshot_file(mut self, path: PathBuf) -> Self {
        self.config.sync.snapshot_file = path;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.concurrency.workers = workers;
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
