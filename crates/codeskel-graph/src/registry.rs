//! Declarative grammar table.
//!
//! Each supported language is a single [`GrammarConfig`] entry naming its
//! file extensions and the syntax-node vocabulary used to find functions and
//! call sites. Extraction code never branches on language: adding a language
//! means appending an entry to [`BUILTIN_GRAMMARS`].

use thiserror::Error;

/// Errors raised by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown language: {0}")]
    UnknownLanguage(String),
}

/// Constructor for a compiled tree-sitter grammar.
pub type GrammarFn = fn() -> tree_sitter::Language;

/// Syntax vocabulary for one language.
#[derive(Debug, Clone, Copy)]
pub struct GrammarConfig {
    /// Stable language identifier (e.g. `"python"`).
    pub id: &'static str,
    /// File extensions without the leading dot, lowercase.
    pub extensions: &'static [&'static str],
    /// Node kinds that represent a callable definition, in extraction order.
    pub function_kinds: &'static [&'static str],
    /// Field on a function node holding its identifier.
    pub name_field: &'static str,
    /// Node kind of a call site.
    pub call_kind: &'static str,
    /// Field on a call node holding the callee expression.
    pub callee_field: &'static str,
    /// Grammar constructor.
    pub grammar: GrammarFn,
}

impl GrammarConfig {
    /// Check whether this grammar claims a file extension (case-insensitive).
    pub fn handles_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

fn python_grammar() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

fn javascript_grammar() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn typescript_grammar() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx_grammar() -> tree_sitter::Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn java_grammar() -> tree_sitter::Language {
    tree_sitter_java::LANGUAGE.into()
}

fn rust_grammar() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

const ECMASCRIPT_FUNCTIONS: &[&str] = &[
    "function_declaration",
    "method_definition",
    "arrow_function",
];

/// The grammars shipped with codeskel.
pub static BUILTIN_GRAMMARS: &[GrammarConfig] = &[
    GrammarConfig {
        id: "python",
        extensions: &["py", "pyi"],
        function_kinds: &["function_definition"],
        name_field: "name",
        call_kind: "call",
        callee_field: "function",
        grammar: python_grammar,
    },
    GrammarConfig {
        id: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        function_kinds: ECMASCRIPT_FUNCTIONS,
        name_field: "name",
        call_kind: "call_expression",
        callee_field: "function",
        grammar: javascript_grammar,
    },
    GrammarConfig {
        id: "typescript",
        extensions: &["ts", "mts", "cts"],
        function_kinds: ECMASCRIPT_FUNCTIONS,
        name_field: "name",
        call_kind: "call_expression",
        callee_field: "function",
        grammar: typescript_grammar,
    },
    GrammarConfig {
        id: "tsx",
        extensions: &["tsx"],
        function_kinds: ECMASCRIPT_FUNCTIONS,
        name_field: "name",
        call_kind: "call_expression",
        callee_field: "function",
        grammar: tsx_grammar,
    },
    GrammarConfig {
        id: "java",
        extensions: &["java"],
        function_kinds: &["method_declaration"],
        name_field: "name",
        call_kind: "method_invocation",
        callee_field: "name",
        grammar: java_grammar,
    },
    GrammarConfig {
        id: "rust",
        extensions: &["rs"],
        function_kinds: &["function_item"],
        name_field: "name",
        call_kind: "call_expression",
        callee_field: "function",
        grammar: rust_grammar,
    },
];

/// An ordered set of grammar configurations.
///
/// Registration order matters: when two entries claim the same extension,
/// the earlier one wins in the parser pool.
#[derive(Debug, Clone)]
pub struct GrammarRegistry {
    configs: Vec<GrammarConfig>,
}

impl GrammarRegistry {
    /// Create a registry from explicit entries.
    pub fn new(configs: Vec<GrammarConfig>) -> Self {
        Self { configs }
    }

    /// Registry with every built-in grammar.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_GRAMMARS.to_vec())
    }

    /// Look up a language by id.
    pub fn get(&self, id: &str) -> Result<&GrammarConfig, RegistryError> {
        self.configs
            .iter()
            .find(|config| config.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| RegistryError::UnknownLanguage(id.to_string()))
    }

    /// Keep only the listed languages, in the order given.
    ///
    /// Fails on the first id that is not registered.
    pub fn restrict<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self, RegistryError> {
        let configs = ids
            .iter()
            .map(|id| self.get(id.as_ref()).copied())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(configs))
    }

    /// Find the first entry claiming an extension.
    pub fn for_extension(&self, ext: &str) -> Option<&GrammarConfig> {
        self.configs.iter().find(|config| config.handles_extension(ext))
    }

    /// All registered entries in registration order.
    pub fn configs(&self) -> &[GrammarConfig] {
        &self.configs
    }

    /// All registered language ids.
    pub fn ids(&self) -> Vec<&'static str> {
        self.configs.iter().map(|config| config.id).collect()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
