//! codeskel: Code structure graph builder
//!
//! Walks a source tree, extracts every function and the calls it makes, and
//! writes the result as a JSON graph document for downstream enrichment.

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeskel_graph::{Graph, GraphBuilder, ParserPool};
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;

/// Build a JSON graph of functions and their calls from a source tree
#[derive(Parser)]
#[command(name = "codeskel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .codeskel directory (default: search for .codeskel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the code graph document
    Build {
        /// Directory to scan (default: project root from config or current dir)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Repository label written into the document
        #[arg(long, env = "CODESKEL_REPO_URL")]
        repo_url: Option<String>,

        /// Output path for the graph document
        #[arg(long)]
        output: Option<PathBuf>,

        /// Extraction worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Write the document to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// List supported languages and whether their grammar loaded
    Languages,

    /// List function keys still waiting for a summary
    Pending {
        /// Graph document to read (default: output path from config)
        #[arg(long)]
        graph: Option<PathBuf>,
    },

    /// Initialize a new .codeskel directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to stderr plus daily-rotated files in `logs_dir`.
fn init_file_logging(logs_dir: &Path, verbose: bool) {
    if let Err(e) = std::fs::create_dir_all(logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "codeskel.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load configuration from an explicit directory or by discovery.
///
/// Returns the config and the `.codeskel` directory it came from, if any.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        // Explicit path override - treat as path to .codeskel directory
        let config_file = if path.is_dir() {
            path.join(config::CONFIG_FILE)
        } else {
            path.clone()
        };
        let codeskel_dir = config_file.parent().unwrap_or(path).to_path_buf();
        let config = Config::from_file(&config_file)?;
        return Ok((config, Some(codeskel_dir)));
    }

    match Config::find_and_load()? {
        Some((config, codeskel_dir)) => Ok((config, Some(codeskel_dir))),
        None => Ok((Config::default(), None)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_dir) = load_config(cli.config.as_ref())?;
    match config.resolve_log_dir(config_dir.as_deref()) {
        Some(logs_dir) => init_file_logging(&logs_dir, cli.verbose),
        None => init_logging(cli.verbose),
    }
    match &config_dir {
        Some(dir) => info!("Found config at {}", dir.display()),
        None => debug!("No .codeskel/config.toml found, using defaults"),
    }

    match cli.command {
        Commands::Build {
            path,
            repo_url,
            output,
            jobs,
            stdout,
        } => {
            let mut config = config;
            if let Some(jobs) = jobs {
                config.graph.jobs = jobs;
            }

            let errors = config.validate();
            if !errors.is_empty() {
                for e in &errors {
                    warn!("Invalid config: {}", e);
                }
                anyhow::bail!("Configuration has {} error(s)", errors.len());
            }

            let source_path = path.unwrap_or_else(|| config.resolve_root(config_dir.as_deref()));
            // Canonicalize to resolve relative paths like "." or ".."
            let source_path = source_path.canonicalize().unwrap_or(source_path);
            let repository_url = repo_url.unwrap_or_else(|| config.project.repository_url.clone());

            let registry = config.registry()?;
            let mut builder = GraphBuilder::with_options(&registry, config.build_options())?;
            info!("Building graph for {}", source_path.display());
            let (graph, report) = builder.build_directory(&source_path, &repository_url)?;

            for skipped in &report.skipped_languages {
                warn!("Language unavailable: {}", skipped);
            }
            info!(
                "Added {} functions from {} files ({} skipped)",
                report.functions_added,
                report.files_parsed,
                report.files_skipped()
            );

            if stdout {
                let json = if config.output.pretty {
                    graph.to_json_pretty()?
                } else {
                    graph.to_json()?
                };
                let mut out = std::io::stdout().lock();
                writeln!(out, "{}", json)?;
            } else {
                let graph_path =
                    output.unwrap_or_else(|| config.resolve_output_path(config_dir.as_deref()));
                if let Some(parent) = graph_path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory: {}", parent.display())
                    })?;
                }
                graph
                    .write_to(&graph_path, config.output.pretty)
                    .with_context(|| format!("Failed to write graph: {}", graph_path.display()))?;
                info!("Wrote {}", graph_path.display());
            }
        }

        Commands::Languages => {
            let registry = config.registry()?;
            let pool = ParserPool::load(&registry);
            let mut out = std::io::stdout().lock();
            for grammar in registry.configs() {
                let loaded = pool.grammars().iter().any(|g| g.config.id == grammar.id);
                writeln!(
                    out,
                    "{:<12} {:<8} {}",
                    grammar.id,
                    if loaded { "loaded" } else { "missing" },
                    grammar.extensions.join(", ")
                )?;
            }
        }

        Commands::Pending { graph } => {
            let graph_path =
                graph.unwrap_or_else(|| config.resolve_output_path(config_dir.as_deref()));
            let graph = Graph::read_from(&graph_path)
                .with_context(|| format!("Failed to read graph: {}", graph_path.display()))?;

            let mut out = std::io::stdout().lock();
            let mut count = 0usize;
            for (key, _) in graph.pending_summaries() {
                writeln!(out, "{}", key)?;
                count += 1;
            }
            info!("{} of {} functions pending", count, graph.len());
        }

        Commands::Init { force } => {
            use config::{CODESKEL_DIR, CONFIG_FILE};

            let codeskel_dir = PathBuf::from(CODESKEL_DIR);
            let config_path = codeskel_dir.join(CONFIG_FILE);

            if config_path.exists() && !force {
                anyhow::bail!(".codeskel/config.toml already exists. Use --force to overwrite.");
            }

            if !codeskel_dir.exists() {
                std::fs::create_dir_all(&codeskel_dir)?;
                info!("Created {}/", codeskel_dir.display());
            }

            std::fs::write(&config_path, config::DEFAULT_CONFIG)?;
            info!("Created {}", config_path.display());
            info!("Next steps:");
            info!("  1. Edit .codeskel/config.toml to configure your project");
            info!("  2. Run 'codeskel build' to write the graph document");
            info!("  3. Run 'codeskel pending' to list functions awaiting summaries");
        }
    }

    Ok(())
}
