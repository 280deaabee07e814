//! Configuration file support for codeskel.
//!
//! All codeskel data is stored in a `.codeskel/` directory:
//! - `.codeskel/config.toml` - Configuration file
//! - `.codeskel/skeleton_graph.json` - Default graph document
//! - `.codeskel/logs/` - Log files, when enabled
//!
//! Config discovery searches for `.codeskel/config.toml` starting from the
//! current directory and walking up to parent directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// The codeskel data directory name.
pub const CODESKEL_DIR: &str = ".codeskel";
/// The config file name within the codeskel directory.
pub const CONFIG_FILE: &str = "config.toml";

use anyhow::{Context, Result};
use codeskel_graph::{BuildOptions, DEFAULT_IGNORE_DIRS, GrammarRegistry};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Project settings.
    pub project: ProjectConfig,
    /// Graph build settings.
    pub graph: GraphConfig,
    /// Output document settings.
    pub output: OutputConfig,
    /// Log file settings.
    pub logging: LoggingConfig,
}

/// Project configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root directory to scan, relative to the directory holding `.codeskel/`.
    pub root: PathBuf,
    /// Label written into the graph document.
    pub repository_url: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            repository_url: String::new(),
        }
    }
}

/// Graph build configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Registry ids to load. Empty means every built-in language.
    pub languages: Vec<String>,
    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,
    /// Honor `.gitignore` files during the walk.
    pub respect_gitignore: bool,
    /// Extraction worker threads.
    pub jobs: usize,
    /// Per-file parse timeout in milliseconds; 0 disables it.
    pub parse_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            respect_gitignore: false,
            jobs: 1,
            parse_timeout_ms: 0,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the graph document.
    pub path: PathBuf,
    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            // Relative to .codeskel/ directory
            path: PathBuf::from("skeleton_graph.json"),
            pretty: true,
        }
    }
}

/// Log file configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily log files, relative to `.codeskel/`. Unset logs to stderr only.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Looks for `.codeskel/config.toml` in the directory and its parents.
    /// Returns the config and the `.codeskel` directory it was found in.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let codeskel_dir = dir.join(CODESKEL_DIR);
            let config_path = codeskel_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, codeskel_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a path relative to the .codeskel directory.
    fn resolve(path: &Path, codeskel_dir: Option<&Path>) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(dir) = codeskel_dir {
            dir.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Resolve the project root relative to the directory containing .codeskel.
    pub fn resolve_root(&self, codeskel_dir: Option<&Path>) -> PathBuf {
        let project_dir = codeskel_dir.map(|dir| dir.parent().unwrap_or(dir));
        Self::resolve(&self.project.root, project_dir)
    }

    /// Resolve the output path relative to the .codeskel directory.
    pub fn resolve_output_path(&self, codeskel_dir: Option<&Path>) -> PathBuf {
        Self::resolve(&self.output.path, codeskel_dir)
    }

    /// Resolve the log directory, if file logging is enabled.
    pub fn resolve_log_dir(&self, codeskel_dir: Option<&Path>) -> Option<PathBuf> {
        self.logging
            .dir
            .as_deref()
            .map(|dir| Self::resolve(dir, codeskel_dir))
    }

    /// Grammar registry restricted to the configured languages.
    pub fn registry(&self) -> Result<GrammarRegistry> {
        let builtin = GrammarRegistry::builtin();
        if self.graph.languages.is_empty() {
            return Ok(builtin);
        }
        builtin
            .restrict(&self.graph.languages)
            .context("Invalid [graph] languages")
    }

    /// Builder options from the [graph] section.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            ignore_dirs: self.graph.ignore_dirs.clone(),
            respect_gitignore: self.graph.respect_gitignore,
            jobs: self.graph.jobs,
            parse_timeout: (self.graph.parse_timeout_ms > 0)
                .then(|| Duration::from_millis(self.graph.parse_timeout_ms)),
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        let registry = GrammarRegistry::builtin();
        for language in &self.graph.languages {
            if registry.get(language).is_err() {
                errors.push(ConfigValidationError {
                    field: "graph.languages".to_string(),
                    message: format!(
                        "Unknown language '{}'. Expected one of: {}.",
                        language,
                        registry.ids().join(", ")
                    ),
                });
            }
        }

        if self.graph.jobs == 0 {
            errors.push(ConfigValidationError {
                field: "graph.jobs".to_string(),
                message: "Jobs must be at least 1.".to_string(),
            });
        }

        for dir in &self.graph.ignore_dirs {
            if dir.is_empty() || dir.contains('/') || dir.contains('\\') {
                errors.push(ConfigValidationError {
                    field: "graph.ignore_dirs".to_string(),
                    message: format!(
                        "Invalid entry '{}'. Expected a single directory name.",
                        dir
                    ),
                });
            }
        }

        if self.output.path.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "output.path".to_string(),
                message: "Output path cannot be empty.".to_string(),
            });
        }

        errors
    }
}

/// Contents written by `codeskel init`.
pub const DEFAULT_CONFIG: &str = r#"# codeskel configuration
# project.root is relative to the directory holding .codeskel/;
# all other paths are relative to this .codeskel/ directory unless absolute

[project]
root = "."  # The project containing .codeskel/
repository_url = ""

[graph]
# languages = ["python", "javascript", "typescript", "tsx", "java", "rust"]
ignore_dirs = [".git", "node_modules", "__pycache__"]
respect_gitignore = false
jobs = 1
parse_timeout_ms = 0  # 0 disables the timeout

[output]
path = "skeleton_graph.json"  # Stored in .codeskel/skeleton_graph.json
pretty = true

# [logging]
# dir = "logs"
"#;
