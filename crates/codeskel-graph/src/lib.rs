//! codeskel-graph: Code structure graph extraction
//!
//! This crate walks a source tree and builds a JSON-serializable graph of
//! every function it can find and the plain-identifier calls each one makes:
//! - Grammar registry describing how each language spells functions and calls
//! - Parser pool binding tree-sitter grammars to file extensions
//! - Grammar-agnostic node matching and function/call extraction
//! - Graph assembly with collision-safe keys and a directory listing

pub mod builder;
pub mod extract;
pub mod graph;
pub mod matcher;
pub mod parser;
pub mod registry;

pub use builder::{
    BuildError, BuildOptions, BuildReport, DEFAULT_IGNORE_DIRS, GraphBuilder, SkippedFile,
    SkippedNode,
};
pub use extract::{
    ExtractedFunction, FileExtraction, UnnamedNode, extract_calls, extract_functions,
};
pub use graph::{FunctionRecord, Graph, GraphError};
pub use matcher::{find_nodes, node_text, resolve_callee, resolve_name};
pub use parser::{GrammarLoadError, LoadedGrammar, ParseError, ParsedUnit, ParserPool};
pub use registry::{BUILTIN_GRAMMARS, GrammarConfig, GrammarRegistry, RegistryError};
