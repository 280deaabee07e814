//! Graph builder for constructing code graphs from a directory tree.
//!
//! This module coordinates the directory walk, parsing, and extraction, and
//! merges per-file results into a single [`Graph`]. Failures below the build
//! level never abort it: unloadable grammars, unreadable files, and unnamed
//! nodes are skipped and reported in the [`BuildReport`].

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::extract::{FileExtraction, UnnamedNode, extract_functions};
use crate::graph::Graph;
use crate::parser::{GrammarLoadError, LoadedGrammar, ParseError, ParserPool};
use crate::registry::GrammarRegistry;

/// Directory names never descended into.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[".git", "node_modules", "__pycache__"];

/// Error type for graph building operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(
        "No languages loaded: every grammar failed to load, so no files can be analyzed. \
         Check that the tree-sitter grammar crates match the runtime version."
    )]
    NoLanguagesLoaded,
    #[error("Not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Options controlling a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory names pruned from the walk, matched against the entry name.
    pub ignore_dirs: Vec<String>,
    /// Also honor `.gitignore` and `.git/info/exclude`.
    pub respect_gitignore: bool,
    /// Worker threads for extraction; 0 and 1 both mean single-threaded.
    pub jobs: usize,
    /// Per-file parse limit; `None` means unlimited.
    pub parse_timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            respect_gitignore: false,
            jobs: 1,
            parse_timeout: None,
        }
    }
}

/// A file the build could not analyze.
#[derive(Debug)]
pub struct SkippedFile {
    /// Path relative to the scanned root.
    pub path: String,
    pub error: ParseError,
}

/// A function node dropped for lack of a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    /// Path relative to the scanned root.
    pub path: String,
    pub node: UnnamedNode,
}

/// Coverage report for a build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Files parsed and extracted.
    pub files_parsed: usize,
    /// Function records added to the graph.
    pub functions_added: usize,
    /// Time spent reading, parsing, and extracting, summed over files.
    pub parse_time_ms: u64,
    /// Files that could not be read or parsed.
    pub skipped_files: Vec<SkippedFile>,
    /// Function nodes dropped for lack of a name.
    pub skipped_nodes: Vec<SkippedNode>,
    /// Languages whose grammar failed to load.
    pub skipped_languages: Vec<GrammarLoadError>,
    /// Entries the directory walk could not visit.
    pub walk_errors: Vec<String>,
}

impl BuildReport {
    /// Merge another BuildReport into this one.
    pub fn merge(&mut self, other: BuildReport) {
        self.files_parsed += other.files_parsed;
        self.functions_added += other.functions_added;
        self.parse_time_ms += other.parse_time_ms;
        self.skipped_files.extend(other.skipped_files);
        self.skipped_nodes.extend(other.skipped_nodes);
        self.skipped_languages.extend(other.skipped_languages);
        self.walk_errors.extend(other.walk_errors);
    }

    /// Number of files skipped.
    pub fn files_skipped(&self) -> usize {
        self.skipped_files.len()
    }

    /// Number of function nodes skipped.
    pub fn nodes_skipped(&self) -> usize {
        self.skipped_nodes.len()
    }
}

/// A source file discovered by the walk.
#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    relative: String,
}

/// Result of walking the directory tree.
#[derive(Debug, Default)]
struct WalkResult {
    directories: BTreeMap<String, Vec<String>>,
    sources: Vec<SourceFile>,
    errors: Vec<String>,
}

/// Outcome of analyzing one file.
struct FileOutcome {
    relative: String,
    result: std::result::Result<FileExtraction, ParseError>,
    elapsed_ms: u64,
}

/// Join the components of a relative path with `/`.
fn join_components(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// File path relative to the root, `/`-separated, no leading slash.
fn relative_file_path(root: &Path, path: &Path) -> String {
    join_components(path.strip_prefix(root).unwrap_or(path))
}

/// Directory key for the file map: `/` for the root, `/sub/dir` otherwise.
fn directory_key(root: &Path, dir: &Path) -> String {
    format!("/{}", join_components(dir.strip_prefix(root).unwrap_or(dir)))
}

/// Read, parse, and extract one file.
fn analyze(pool: &mut ParserPool, source: &SourceFile) -> FileOutcome {
    let start = Instant::now();
    let result = pool
        .parse_file(&source.path)
        .map(|unit| extract_functions(&unit));
    FileOutcome {
        relative: source.relative.clone(),
        result,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

/// Coordinates walking, parsing, and graph construction.
///
/// The GraphBuilder owns the parser pool for the duration of a build and is
/// the only writer of the graph it produces.
pub struct GraphBuilder {
    pool: ParserPool,
    options: BuildOptions,
}

impl GraphBuilder {
    /// Create a GraphBuilder with default options.
    pub fn new(registry: &GrammarRegistry) -> Result<Self> {
        Self::with_options(registry, BuildOptions::default())
    }

    /// Create a GraphBuilder, loading a parser for every registered grammar.
    ///
    /// Fails only if no grammar at all could be loaded.
    pub fn with_options(registry: &GrammarRegistry, options: BuildOptions) -> Result<Self> {
        let pool = ParserPool::load(registry).with_timeout(options.parse_timeout);
        if pool.is_empty() {
            return Err(BuildError::NoLanguagesLoaded);
        }
        info!("Loaded parsers for extensions: {:?}", pool.extensions());
        Ok(Self { pool, options })
    }

    /// Get a reference to the underlying parser pool.
    pub fn pool(&self) -> &ParserPool {
        &self.pool
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the graph for every supported file under `root`.
    ///
    /// Returns an error only if `root` is not a directory. Everything else
    /// is recorded in the report and the walk continues.
    pub fn build_directory(
        &mut self,
        root: &Path,
        repository_url: &str,
    ) -> Result<(Graph, BuildReport)> {
        if !root.is_dir() {
            return Err(BuildError::RootNotDirectory(root.to_path_buf()));
        }

        let mut report = BuildReport {
            skipped_languages: self.pool.skipped().to_vec(),
            ..Default::default()
        };
        let mut graph = Graph::new(repository_url);

        let walk = self.walk(root);
        for error in &walk.errors {
            warn!("Skipping unreadable entry: {}", error);
        }
        report.walk_errors = walk.errors;
        for (dir, files) in walk.directories {
            graph.record_directory(dir, files);
        }

        let mut sources = walk.sources;
        sources.sort_by(|a, b| a.relative.cmp(&b.relative));

        let outcomes = if self.options.jobs > 1 {
            self.analyze_parallel(&sources)
        } else {
            sources
                .iter()
                .map(|source| analyze(&mut self.pool, source))
                .collect()
        };

        // Serial merge in sorted order keeps key assignment reproducible
        for outcome in outcomes {
            report.parse_time_ms += outcome.elapsed_ms;
            match outcome.result {
                Ok(extraction) => {
                    report.files_parsed += 1;
                    for node in extraction.unnamed {
                        debug!(
                            "Skipping unnamed {} at {}:{}:{}",
                            node.kind, outcome.relative, node.row, node.column
                        );
                        report.skipped_nodes.push(SkippedNode {
                            path: outcome.relative.clone(),
                            node,
                        });
                    }
                    for function in extraction.functions {
                        graph.insert_function(&outcome.relative, function);
                        report.functions_added += 1;
                    }
                }
                Err(error) => {
                    warn!("Skipping {}: {}", outcome.relative, error);
                    report.skipped_files.push(SkippedFile {
                        path: outcome.relative,
                        error,
                    });
                }
            }
        }

        info!(
            "Built graph: {} functions from {} files ({} files skipped, {} nodes skipped, {}ms)",
            report.functions_added,
            report.files_parsed,
            report.files_skipped(),
            report.nodes_skipped(),
            report.parse_time_ms
        );

        Ok((graph, report))
    }

    /// Analyze files on a bounded worker pool, one parser pool per worker.
    ///
    /// Output order matches `sources` regardless of scheduling.
    fn analyze_parallel(&mut self, sources: &[SourceFile]) -> Vec<FileOutcome> {
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build();
        let threads = match threads {
            Ok(threads) => threads,
            Err(e) => {
                warn!("Failed to start worker pool ({}), analyzing serially", e);
                return sources
                    .iter()
                    .map(|source| analyze(&mut self.pool, source))
                    .collect();
            }
        };

        let grammars: &[LoadedGrammar] = self.pool.grammars();
        let timeout = self.pool.timeout();
        debug!("Analyzing {} files on {} workers", sources.len(), self.options.jobs);

        threads.install(|| {
            sources
                .par_iter()
                .map_init(
                    || ParserPool::from_loaded(grammars, timeout),
                    |pool, source| analyze(pool, source),
                )
                .collect()
        })
    }

    /// Walk `root`, pruning ignored directories before descending.
    fn walk(&self, root: &Path) -> WalkResult {
        let mut result = WalkResult::default();
        let ignore_dirs = self.options.ignore_dirs.clone();
        let respect_gitignore = self.options.respect_gitignore;

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .git_ignore(respect_gitignore)
            .git_exclude(respect_gitignore)
            .parents(respect_gitignore)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && ignore_dirs.iter().any(|name| entry.file_name() == name.as_str()))
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.errors.push(e.to_string());
                    continue;
                }
            };
            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                continue;
            }
            let path = entry.path();
            // Symlinked directories are listed nowhere, as they are not descended
            if file_type.is_symlink() && path.is_dir() {
                continue;
            }

            let Some(parent) = path.parent() else {
                continue;
            };
            result
                .directories
                .entry(directory_key(root, parent))
                .or_default()
                .push(entry.file_name().to_string_lossy().into_owned());

            // Only regular files are read; FIFOs and devices could block
            let readable = file_type.is_file() || (file_type.is_symlink() && path.is_file());
            if readable && self.pool.supports_path(path) {
                result.sources.push(SourceFile {
                    path: path.to_path_buf(),
                    relative: relative_file_path(root, path),
                });
            }
        }

        result
    }
}
