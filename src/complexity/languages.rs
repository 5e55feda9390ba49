//! Per-language tree-sitter rules for function discovery and complexity
//!
//! Every supported language is described by a `LanguageRules` table: which
//! node kinds are functions, which are decision points, and which binary
//! operator tokens short-circuit. The walker itself is shared.

use super::AnalysisError;
use crate::models::FunctionRecord;
use std::path::Path;
use tree_sitter::{Language, Node, Parser};

/// Name given to functions with no binding
pub const ANONYMOUS: &str = "(anonymous)";

const COMMENT_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

/// Node kinds whose leading child can be the `default` keyword
const CASE_LABEL_KINDS: &[&str] = &["case_statement", "switch_label"];

/// Declarator kinds that end a C/C++ declarator chain
const DECLARATOR_NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "qualified_identifier",
    "destructor_name",
    "operator_name",
];

pub(crate) struct LanguageRules {
    pub name: &'static str,
    language: fn() -> Language,
    function_kinds: &'static [&'static str],
    decision_kinds: &'static [&'static str],
    logical_operators: &'static [&'static str],
}

fn javascript() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn typescript() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn python() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn rust() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn go() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn java() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

fn c() -> Language {
    tree_sitter_c::LANGUAGE.into()
}

fn cpp() -> Language {
    tree_sitter_cpp::LANGUAGE.into()
}

const JS_FUNCTIONS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

const JS_DECISIONS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
];

const SHORT_CIRCUIT: &[&str] = &["&&", "||"];

static JAVASCRIPT: LanguageRules = LanguageRules {
    name: "JavaScript",
    language: javascript,
    function_kinds: JS_FUNCTIONS,
    decision_kinds: JS_DECISIONS,
    logical_operators: SHORT_CIRCUIT,
};

static TYPESCRIPT: LanguageRules = LanguageRules {
    name: "TypeScript",
    language: typescript,
    function_kinds: JS_FUNCTIONS,
    decision_kinds: JS_DECISIONS,
    logical_operators: SHORT_CIRCUIT,
};

static TSX: LanguageRules = LanguageRules {
    name: "TSX",
    language: tsx,
    function_kinds: JS_FUNCTIONS,
    decision_kinds: JS_DECISIONS,
    logical_operators: SHORT_CIRCUIT,
};

static PYTHON: LanguageRules = LanguageRules {
    name: "Python",
    language: python,
    function_kinds: &["function_definition"],
    decision_kinds: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "boolean_operator",
        "if_clause",
        "case_clause",
    ],
    logical_operators: &[],
};

static RUST: LanguageRules = LanguageRules {
    name: "Rust",
    language: rust,
    function_kinds: &["function_item"],
    decision_kinds: &[
        "if_expression",
        "while_expression",
        "for_expression",
        "match_arm",
    ],
    logical_operators: SHORT_CIRCUIT,
};

static GO: LanguageRules = LanguageRules {
    name: "Go",
    language: go,
    function_kinds: &["function_declaration", "method_declaration", "func_literal"],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
    ],
    logical_operators: SHORT_CIRCUIT,
};

static JAVA: LanguageRules = LanguageRules {
    name: "Java",
    language: java,
    function_kinds: &["method_declaration", "constructor_declaration"],
    decision_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "enhanced_for_statement",
        "do_statement",
        "catch_clause",
        "switch_label",
        "ternary_expression",
    ],
    logical_operators: SHORT_CIRCUIT,
};

static C: LanguageRules = LanguageRules {
    name: "C",
    language: c,
    function_kinds: &["function_definition"],
    decision_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "do_statement",
        "case_statement",
        "conditional_expression",
    ],
    logical_operators: SHORT_CIRCUIT,
};

static CPP: LanguageRules = LanguageRules {
    name: "C++",
    language: cpp,
    function_kinds: &["function_definition", "lambda_expression"],
    decision_kinds: &[
        "if_statement",
        "while_statement",
        "for_statement",
        "for_range_loop",
        "do_statement",
        "case_statement",
        "catch_clause",
        "conditional_expression",
    ],
    logical_operators: SHORT_CIRCUIT,
};

/// Look up the rules for a file extension (without the leading dot)
pub(crate) fn rules_for_extension(ext: &str) -> Option<&'static LanguageRules> {
    match ext.to_ascii_lowercase().as_str() {
        "js" | "jsx" | "mjs" | "cjs" => Some(&JAVASCRIPT),
        "ts" | "mts" | "cts" => Some(&TYPESCRIPT),
        "tsx" => Some(&TSX),
        "py" | "pyi" => Some(&PYTHON),
        "rs" => Some(&RUST),
        "go" => Some(&GO),
        "java" => Some(&JAVA),
        "c" | "h" => Some(&C),
        "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" => Some(&CPP),
        _ => None,
    }
}

/// Language name for an extension, if supported
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    rules_for_extension(ext).map(|r| r.name)
}

impl LanguageRules {
    fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    /// Parse `source` and return one record per function node
    pub(crate) fn functions(
        &self,
        source: &str,
        path: &Path,
    ) -> Result<Vec<FunctionRecord>, AnalysisError> {
        let mut parser = Parser::new();
        parser
            .set_language(&(self.language)())
            .map_err(|e| AnalysisError::Parse {
                path: path.to_path_buf(),
                reason: format!("cannot load {} grammar: {}", self.name, e),
            })?;

        let tree = parser.parse(source, None).ok_or_else(|| AnalysisError::Parse {
            path: path.to_path_buf(),
            reason: format!("{} parser produced no tree", self.name),
        })?;

        let mut records = Vec::new();
        self.collect(&tree.root_node(), source.as_bytes(), path, &mut records);
        Ok(records)
    }

    fn collect(&self, node: &Node, source: &[u8], path: &Path, out: &mut Vec<FunctionRecord>) {
        if self.is_function(node.kind()) {
            out.push(FunctionRecord {
                file: path.to_path_buf(),
                start_line: node.start_position().row as u32 + 1,
                end_line: node.end_position().row as u32 + 1,
                name: function_name(node, source),
                complexity: 1 + self.count_decisions(node, source),
                nloc: count_code_lines(node),
            });
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(&child, source, path, out);
        }
    }

    /// Decision points under `node`, not descending into nested functions
    fn count_decisions(&self, node: &Node, source: &[u8]) -> u32 {
        let mut count = 0;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if self.is_function(child.kind()) {
                continue;
            }
            count += self.decision_weight(&child, source);
            count += self.count_decisions(&child, source);
        }
        count
    }

    fn decision_weight(&self, node: &Node, source: &[u8]) -> u32 {
        let kind = node.kind();
        if self.decision_kinds.contains(&kind) {
            return if is_default_branch(node, source) { 0 } else { 1 };
        }
        if kind == "binary_expression" && !self.logical_operators.is_empty() {
            let mut cursor = node.walk();
            return node
                .children(&mut cursor)
                .filter(|c| self.logical_operators.contains(&c.kind()))
                .count() as u32;
        }
        0
    }
}

/// `default:` labels, `_ =>` arms and `case _:` clauses are not decisions
fn is_default_branch(node: &Node, source: &[u8]) -> bool {
    if CASE_LABEL_KINDS.contains(&node.kind()) {
        let mut cursor = node.walk();
        return node
            .children(&mut cursor)
            .next()
            .is_some_and(|first| first.kind() == "default");
    }

    let pattern = match node.kind() {
        "match_arm" => node.child_by_field_name("pattern"),
        "case_clause" => node.named_children(&mut node.walk()).next(),
        _ => None,
    };
    pattern
        .and_then(|p| p.utf8_text(source).ok())
        .is_some_and(|text| text.trim() == "_")
}

fn node_text(node: Node, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(str::to_string)
}

fn function_name(node: &Node, source: &[u8]) -> String {
    if let Some(name) = node
        .child_by_field_name("name")
        .and_then(|n| node_text(n, source))
    {
        return name;
    }
    if let Some(name) = declarator_name(node, source) {
        return name;
    }

    // Unnamed function bound to something: use the binding
    if let Some(parent) = node.parent() {
        let binding = match parent.kind() {
            "variable_declarator" | "public_field_definition" | "field_definition" => parent
                .child_by_field_name("name")
                .or_else(|| parent.child_by_field_name("property")),
            "pair" => parent.child_by_field_name("key"),
            "assignment_expression" => parent.child_by_field_name("left"),
            "init_declarator" => parent.child_by_field_name("declarator"),
            _ => None,
        };
        if let Some(name) = binding.and_then(|n| node_text(n, source)) {
            return name;
        }
    }

    ANONYMOUS.to_string()
}

/// Follow a C/C++ `declarator` chain down to the declared name
fn declarator_name(node: &Node, source: &[u8]) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if DECLARATOR_NAME_KINDS.contains(&current.kind()) {
            return node_text(current, source);
        }
        current = current.child_by_field_name("declarator")?;
    }
}

/// Rows covered by non-comment tokens inside `node`
fn count_code_lines(node: &Node) -> u32 {
    let first = node.start_position().row;
    let last = node.end_position().row;
    let mut rows = vec![false; last - first + 1];
    mark_token_rows(node, first, &mut rows);
    rows.iter().filter(|&&r| r).count() as u32
}

fn mark_token_rows(node: &Node, first: usize, rows: &mut [bool]) {
    if COMMENT_KINDS.contains(&node.kind()) {
        return;
    }
    if node.child_count() == 0 {
        for row in node.start_position().row..=node.end_position().row {
            if let Some(slot) = rows.get_mut(row - first) {
                *slot = true;
            }
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        mark_token_rows(&child, first, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ext: &str, source: &str) -> Vec<FunctionRecord> {
        let rules = rules_for_extension(ext).unwrap();
        rules
            .functions(source, Path::new(&format!("test.{}", ext)))
            .unwrap()
    }

    fn by_name<'a>(records: &'a [FunctionRecord], name: &str) -> &'a FunctionRecord {
        records
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no function named {}", name))
    }

    #[test]
    fn test_extension_lookup() {
        assert_eq!(language_for_extension("js"), Some("JavaScript"));
        assert_eq!(language_for_extension("TSX"), Some("TSX"));
        assert_eq!(language_for_extension("py"), Some("Python"));
        assert_eq!(language_for_extension("hpp"), Some("C++"));
        assert_eq!(language_for_extension("kt"), None);
    }

    #[test]
    fn test_javascript_straight_line_is_one() {
        let records = parse("js", "function add(a, b) {\n  return a + b;\n}\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "add");
        assert_eq!(records[0].complexity, 1);
        assert_eq!(records[0].start_line, 1);
        assert_eq!(records[0].end_line, 3);
    }

    #[test]
    fn test_javascript_branches() {
        let source = r#"
function classify(x, y) {
  if (x > 0 && y > 0) {
    return 'both';
  }
  for (let i = 0; i < x; i++) {
    while (y-- > 0) {}
  }
  switch (x) {
    case 1: return 'one';
    case 2: return 'two';
    default: return x > 10 ? 'big' : 'small';
  }
}
"#;
        let records = parse("js", source);
        // if, &&, for, while, 2 cases, ternary
        assert_eq!(by_name(&records, "classify").complexity, 8);
    }

    #[test]
    fn test_nested_functions_are_separate() {
        let source = r#"
const outer = (items) => {
  return items.map(function (item) {
    if (item) { return 1; }
    return 0;
  });
};
"#;
        let records = parse("js", source);
        assert_eq!(records.len(), 2);
        assert_eq!(by_name(&records, "outer").complexity, 1);
        assert_eq!(by_name(&records, ANONYMOUS).complexity, 2);
    }

    #[test]
    fn test_method_and_catch() {
        let source = r#"
class Store {
  load(key) {
    try {
      return this.read(key);
    } catch (e) {
      return null;
    }
  }
}
"#;
        let records = parse("js", source);
        assert_eq!(by_name(&records, "load").complexity, 2);
    }

    #[test]
    fn test_typescript() {
        let source = r#"
export function pick(a: number, b: number): number {
  return a > b ? a : b;
}
"#;
        let records = parse("ts", source);
        assert_eq!(by_name(&records, "pick").complexity, 2);
    }

    #[test]
    fn test_python() {
        let source = r#"
def grade(score, bonus):
    if score > 90 and bonus:
        return "A"
    elif score > 80:
        return "B"
    return "C" if score > 50 else "F"
"#;
        let records = parse("py", source);
        // if, and, elif, conditional
        assert_eq!(by_name(&records, "grade").complexity, 5);
    }

    #[test]
    fn test_rust_match_ignores_wildcard() {
        let source = r#"
fn describe(n: i32) -> &'static str {
    match n {
        0 => "zero",
        1 => "one",
        _ => "many",
    }
}
"#;
        let records = parse("rs", source);
        assert_eq!(by_name(&records, "describe").complexity, 3);
    }

    #[test]
    fn test_c_default_label_not_counted() {
        let source = r#"
int classify(int x) {
    switch (x) {
        case 1: return 1;
        case 2: return 2;
        default: return 0;
    }
}
"#;
        let records = parse("c", source);
        assert_eq!(by_name(&records, "classify").complexity, 3);
    }

    #[test]
    fn test_go_method() {
        let source = r#"
package main

func (s *Server) Handle(ok bool) int {
	if ok || s.force {
		return 1
	}
	return 0
}
"#;
        let records = parse("go", source);
        assert_eq!(by_name(&records, "Handle").complexity, 3);
    }

    #[test]
    fn test_nloc_skips_comments_and_blank_lines() {
        let source = "function f() {\n  // note\n\n  return 1;\n}\n";
        let records = parse("js", source);
        assert_eq!(records[0].nloc, 3);
    }
}
