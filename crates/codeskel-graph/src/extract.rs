//! Function and call extraction from a parsed file.
//!
//! Driven entirely by the [`GrammarConfig`] attached to the parsed unit.

use std::collections::BTreeSet;

use tracing::trace;
use tree_sitter::Node;

use crate::matcher::{find_nodes, node_text, resolve_callee, resolve_name};
use crate::parser::ParsedUnit;
use crate::registry::GrammarConfig;

/// A named function found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFunction {
    /// Resolved function name.
    pub name: String,
    /// Verbatim source of the whole function node.
    pub code_snippet: String,
    /// Distinct callee identifiers referenced anywhere inside the node.
    pub calls: BTreeSet<String>,
}

/// A function node dropped because no name or text could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnnamedNode {
    pub kind: &'static str,
    /// 1-based position of the node start.
    pub row: usize,
    pub column: usize,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct FileExtraction {
    /// Functions in extraction order: grammar function kinds in
    /// registration order, each kind in pre-order.
    pub functions: Vec<ExtractedFunction>,
    /// Function nodes skipped, in the same order.
    pub unnamed: Vec<UnnamedNode>,
}

impl FileExtraction {
    /// Number of function nodes skipped.
    pub fn nodes_skipped(&self) -> usize {
        self.unnamed.len()
    }
}

/// Collect the distinct plain-identifier callees inside a function node.
///
/// Calls in nested functions are included.
pub fn extract_calls(
    function: Node<'_>,
    config: &GrammarConfig,
    source: &[u8],
) -> BTreeSet<String> {
    find_nodes(function, config.call_kind)
        .filter_map(|call| resolve_callee(call, config.callee_field, source))
        .collect()
}

/// Extract a single function node, or `None` if it should be skipped.
pub fn extract_function(
    node: Node<'_>,
    config: &GrammarConfig,
    source: &[u8],
) -> Option<ExtractedFunction> {
    let name = resolve_name(node, config.name_field, source)?;
    let code_snippet = node_text(node, source)?.to_string();
    let calls = extract_calls(node, config, source);
    Some(ExtractedFunction {
        name,
        code_snippet,
        calls,
    })
}

/// Extract every named function from a parsed file.
pub fn extract_functions(unit: &ParsedUnit) -> FileExtraction {
    let root = unit.root_node();
    let source = unit.source_bytes();
    let mut extraction = FileExtraction::default();

    for &kind in unit.config.function_kinds {
        for node in find_nodes(root, kind) {
            match extract_function(node, &unit.config, source) {
                Some(function) => extraction.functions.push(function),
                None => {
                    let start = node.start_position();
                    let unnamed = UnnamedNode {
                        kind,
                        row: start.row + 1,
                        column: start.column + 1,
                    };
                    trace!("Skipping unnamed {} at {}:{}", kind, unnamed.row, unnamed.column);
                    extraction.unnamed.push(unnamed);
                }
            }
        }
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserPool;
    use crate::registry::GrammarRegistry;

    fn extract(source: &str, ext: &str) -> FileExtraction {
        let mut pool = ParserPool::load(&GrammarRegistry::builtin());
        let unit = pool.parse_source(source.to_string(), ext).unwrap();
        extract_functions(&unit)
    }

    fn names(extraction: &FileExtraction) -> Vec<&str> {
        extraction
            .functions
            .iter()
            .map(|f| f.name.as_str())
            .collect()
    }

    #[test]
    fn test_python_functions_and_calls() {
        let source = "def helper():\n    return 1\n\ndef main():\n    return helper()\n";
        let extraction = extract(source, "py");
        assert_eq!(names(&extraction), vec!["helper", "main"]);
        assert!(extraction.functions[0].calls.is_empty());
        assert_eq!(
            extraction.functions[1].calls.iter().collect::<Vec<_>>(),
            vec!["helper"]
        );
    }

    #[test]
    fn test_snippet_is_verbatim() {
        let source = "def spaced( a ,b ):\n    # keep me\n    return a+b\n";
        let extraction = extract(source, "py");
        assert_eq!(
            extraction.functions[0].code_snippet,
            "def spaced( a ,b ):\n    # keep me\n    return a+b"
        );
    }

    #[test]
    fn test_calls_are_deduplicated() {
        let source = "def run():\n    log()\n    log()\n    step()\n    log()\n";
        let extraction = extract(source, "py");
        let calls: Vec<_> = extraction.functions[0].calls.iter().collect();
        assert_eq!(calls, vec!["log", "step"]);
    }

    #[test]
    fn test_nested_calls_belong_to_outer_function() {
        let source = "def outer():\n    def inner():\n        deep()\n    inner()\n";
        let extraction = extract(source, "py");
        assert_eq!(names(&extraction), vec!["outer", "inner"]);
        let outer: Vec<_> = extraction.functions[0].calls.iter().collect();
        assert_eq!(outer, vec!["deep", "inner"]);
        let inner: Vec<_> = extraction.functions[1].calls.iter().collect();
        assert_eq!(inner, vec!["deep"]);
    }

    #[test]
    fn test_javascript_kinds_in_registration_order() {
        let source = r#"
const arrow = () => first();
class Widget {
    render() { return draw(); }
}
function plain() { return second(); }
"#;
        let extraction = extract(source, "js");
        // function_declaration, then method_definition; the anonymous arrow is skipped
        assert_eq!(names(&extraction), vec!["plain", "render"]);
        assert_eq!(
            extraction.unnamed,
            vec![UnnamedNode {
                kind: "arrow_function",
                row: 2,
                column: 15,
            }]
        );
    }

    #[test]
    fn test_java_methods() {
        let source = r#"
class Service {
    void start() { init(); this.log(); }
    void init() {}
}
"#;
        let extraction = extract(source, "java");
        assert_eq!(names(&extraction), vec!["start", "init"]);
        let calls: Vec<_> = extraction.functions[0].calls.iter().collect();
        assert_eq!(calls, vec!["init", "log"]);
    }

    #[test]
    fn test_rust_functions_skip_paths_and_methods() {
        let source = r#"
fn helper() -> i32 { 42 }

impl Foo {
    fn build() -> Self {
        let n = helper();
        let v = Vec::new();
        v.len();
        Self
    }
}
"#;
        let extraction = extract(source, "rs");
        assert_eq!(names(&extraction), vec!["helper", "build"]);
        let calls: Vec<_> = extraction.functions[1].calls.iter().collect();
        assert_eq!(calls, vec!["helper"]);
    }

    #[test]
    fn test_typescript_functions() {
        let source = "function greet(name: string): string { return format(name); }\n";
        let extraction = extract(source, "ts");
        assert_eq!(names(&extraction), vec!["greet"]);
        assert!(extraction.functions[0].calls.contains("format"));
    }

    #[test]
    fn test_file_without_functions() {
        let extraction = extract("x = 1\n", "py");
        assert!(extraction.functions.is_empty());
        assert_eq!(extraction.nodes_skipped(), 0);
    }
}
