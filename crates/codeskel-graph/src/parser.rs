//! Parser pool: one tree-sitter parser per loaded grammar.
//!
//! Loading is tolerant. A grammar that cannot be bound to a parser (for
//! example an ABI mismatch between the grammar crate and the tree-sitter
//! runtime) is skipped with a warning and the remaining languages load
//! normally.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{GrammarConfig, GrammarRegistry};

/// Errors that cause a single file to be skipped.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    Read(#[from] std::io::Error),

    #[error("File is not valid UTF-8")]
    InvalidEncoding,

    #[error("Failed to parse source code")]
    ParseFailed,

    #[error("Parsing exceeded {0:?}")]
    Timeout(Duration),

    #[error("No parser loaded for extension: {0}")]
    UnsupportedExtension(String),
}

/// A grammar that could not be bound to a parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to load grammar '{language}': {reason}")]
pub struct GrammarLoadError {
    pub language: String,
    pub reason: String,
}

/// A grammar that loaded successfully.
///
/// Cheap to clone and safe to share between threads; worker pools are
/// rebuilt from these without re-running the load step.
#[derive(Debug, Clone)]
pub struct LoadedGrammar {
    pub config: GrammarConfig,
    pub language: tree_sitter::Language,
}

/// A parsed source file together with the grammar used to parse it.
pub struct ParsedUnit {
    /// Grammar configuration used for this file.
    pub config: GrammarConfig,
    /// The tree-sitter syntax tree.
    pub tree: tree_sitter::Tree,
    /// The source code (owned for lifetime management).
    pub source: String,
}

impl ParsedUnit {
    /// Get the root node of the syntax tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Get the source code as bytes.
    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }
}

/// Bind a grammar to a fresh parser.
fn bind(
    config: &GrammarConfig,
    language: &tree_sitter::Language,
) -> Result<tree_sitter::Parser, GrammarLoadError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|e| GrammarLoadError {
            language: config.id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(parser)
}

/// Multi-language parser pool keyed by file extension.
pub struct ParserPool {
    grammars: Vec<LoadedGrammar>,
    parsers: Vec<tree_sitter::Parser>,
    by_extension: HashMap<String, usize>,
    skipped: Vec<GrammarLoadError>,
    timeout: Option<Duration>,
}

impl ParserPool {
    /// Load a parser for every grammar in the registry.
    ///
    /// Never fails: grammars that cannot be loaded are recorded in
    /// [`ParserPool::skipped`]. Check [`ParserPool::is_empty`] before use.
    pub fn load(registry: &GrammarRegistry) -> Self {
        let mut pool = Self::empty();

        for config in registry.configs() {
            let language = (config.grammar)();
            match bind(config, &language) {
                Ok(parser) => {
                    pool.push(*config, language, parser);
                    info!(
                        "Loaded grammar '{}' for extensions {:?}",
                        config.id, config.extensions
                    );
                }
                Err(e) => {
                    warn!("Skipping language: {}", e);
                    pool.skipped.push(e);
                }
            }
        }

        pool
    }

    /// Build a pool from grammars that already loaded elsewhere.
    ///
    /// Used to give each worker thread its own parsers.
    pub fn from_loaded(grammars: &[LoadedGrammar], timeout: Option<Duration>) -> Self {
        let mut pool = Self::empty();
        for grammar in grammars {
            match bind(&grammar.config, &grammar.language) {
                Ok(parser) => pool.push(grammar.config, grammar.language.clone(), parser),
                Err(e) => {
                    warn!("Skipping language: {}", e);
                    pool.skipped.push(e);
                }
            }
        }
        pool.with_timeout(timeout)
    }

    fn empty() -> Self {
        Self {
            grammars: Vec::new(),
            parsers: Vec::new(),
            by_extension: HashMap::new(),
            skipped: Vec::new(),
            timeout: None,
        }
    }

    fn push(
        &mut self,
        config: GrammarConfig,
        language: tree_sitter::Language,
        parser: tree_sitter::Parser,
    ) {
        let index = self.grammars.len();
        for ext in config.extensions {
            // First registration wins
            self.by_extension
                .entry(ext.to_ascii_lowercase())
                .or_insert(index);
        }
        self.grammars.push(LoadedGrammar { config, language });
        self.parsers.push(parser);
    }

    /// Apply a per-file parse timeout to every parser.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        let micros = timeout.map_or(0, |t| t.as_micros().min(u64::MAX as u128) as u64);
        for parser in &mut self.parsers {
            #[allow(deprecated)]
            parser.set_timeout_micros(micros);
        }
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Get the parser and grammar for an extension (without the leading dot).
    ///
    /// Returns `None` for unmapped extensions, including those of languages
    /// whose grammar failed to load.
    pub fn parser_for(
        &mut self,
        ext: &str,
    ) -> Option<(&mut tree_sitter::Parser, &GrammarConfig)> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let index = *self.by_extension.get(&ext)?;
        Some((&mut self.parsers[index], &self.grammars[index].config))
    }

    /// Check if a file extension has a loaded parser.
    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.contains_key(&ext)
    }

    /// Check if a path has a loaded parser.
    pub fn supports_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.supports_extension(ext))
    }

    /// Parse source text with the grammar mapped to `ext`.
    pub fn parse_source(&mut self, source: String, ext: &str) -> Result<ParsedUnit, ParseError> {
        let timeout = self.timeout;
        let (parser, config) = self
            .parser_for(ext)
            .ok_or_else(|| ParseError::UnsupportedExtension(ext.to_string()))?;
        let config = *config;

        match parser.parse(&source, None) {
            Some(tree) => Ok(ParsedUnit {
                config,
                tree,
                source,
            }),
            None => {
                // A cancelled parse resumes on the next call unless reset
                parser.reset();
                match timeout {
                    Some(limit) => Err(ParseError::Timeout(limit)),
                    None => Err(ParseError::ParseFailed),
                }
            }
        }
    }

    /// Read and parse a file from the filesystem.
    pub fn parse_file(&mut self, path: &Path) -> Result<ParsedUnit, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        if !self.supports_extension(&ext) {
            return Err(ParseError::UnsupportedExtension(ext));
        }

        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes).map_err(|_| ParseError::InvalidEncoding)?;
        debug!("Parsing [{}]: {}", ext, path.display());
        self.parse_source(source, &ext)
    }

    /// Grammars that loaded successfully, in registration order.
    pub fn grammars(&self) -> &[LoadedGrammar] {
        &self.grammars
    }

    /// Grammars that failed to load.
    pub fn skipped(&self) -> &[GrammarLoadError] {
        &self.skipped
    }

    /// Loaded extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Configured per-file timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// True when no grammar loaded.
    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ParserPool {
        ParserPool::load(&GrammarRegistry::builtin())
    }

    #[test]
    fn test_all_builtin_grammars_load() {
        let pool = pool();
        assert!(pool.skipped().is_empty(), "skipped: {:?}", pool.skipped());
        assert_eq!(pool.grammars().len(), GrammarRegistry::builtin().len());
    }

    #[test]
    fn test_parser_for_extension() {
        let mut pool = pool();
        let (_, config) = pool.parser_for("py").expect("python loaded");
        assert_eq!(config.id, "python");
        let (_, config) = pool.parser_for(".JAVA").expect("java loaded");
        assert_eq!(config.id, "java");
        assert!(pool.parser_for("txt").is_none());
    }

    #[test]
    fn test_restricted_registry_leaves_other_extensions_unmapped() {
        let registry = GrammarRegistry::builtin().restrict(&["python"]).unwrap();
        let mut pool = ParserPool::load(&registry);
        assert!(pool.parser_for("py").is_some());
        assert!(pool.parser_for("js").is_none());
        assert_eq!(pool.extensions(), vec!["py", "pyi"]);
    }

    #[test]
    fn test_parse_python_source() {
        let mut pool = pool();
        let parsed = pool
            .parse_source("def hello():\n    print('hi')\n".to_string(), "py")
            .unwrap();
        assert_eq!(parsed.config.id, "python");
        assert!(!parsed.root_node().has_error());
    }

    #[test]
    fn test_parse_tolerates_syntax_errors() {
        let mut pool = pool();
        let parsed = pool
            .parse_source("function broken( {".to_string(), "js")
            .expect("tree-sitter recovers from syntax errors");
        assert!(parsed.root_node().has_error());
    }

    #[test]
    fn test_parse_unsupported_extension() {
        let mut pool = pool();
        let err = pool.parse_source(String::new(), "md").err();
        assert!(matches!(err, Some(ParseError::UnsupportedExtension(ext)) if ext == "md"));
    }

    #[test]
    fn test_parse_file_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.py");
        std::fs::write(&path, [0x64, 0x65, 0x66, 0x20, 0xff, 0xfe, 0x28]).unwrap();

        let mut pool = pool();
        assert!(matches!(
            pool.parse_file(&path),
            Err(ParseError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool();
        assert!(matches!(
            pool.parse_file(&dir.path().join("missing.py")),
            Err(ParseError::Read(_))
        ));
    }

    #[test]
    fn test_from_loaded_matches_source_pool() {
        let original = pool();
        let mut worker =
            ParserPool::from_loaded(original.grammars(), Some(Duration::from_secs(5)));
        assert_eq!(worker.extensions(), original.extensions());
        assert_eq!(worker.timeout(), Some(Duration::from_secs(5)));
        assert!(worker.parser_for("rs").is_some());
    }

    #[test]
    fn test_zero_timeout_means_unlimited() {
        let pool = pool().with_timeout(Some(Duration::ZERO));
        assert_eq!(pool.timeout(), None);
    }
}
