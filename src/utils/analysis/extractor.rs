//! Python symbol extraction.
//!
//! Turns one source file into a [`SourceFile`]: every class, function and
//! method with a one-line signature, plus every import statement. A file
//! that does not parse cleanly yields [`Extraction::Failed`] with no
//! symbols; there is no partial extraction from broken code.

use tree_sitter::{Language, Node, Parser};

use crate::core::{Extraction, ImportRef, PYTHON, SourceFile, Symbol, SymbolKind};
use crate::error::{ExtractError, ExtractResult};
use crate::utils::analysis::annotation::{collapse, render_annotation};

/// Statement nesting deeper than this is not searched for declarations.
const MAX_NESTING: usize = 128;

/// Statements whose bodies may hold declarations or imports.
const COMPOUND_STATEMENTS: &[&str] = &[
    "block",
    "if_statement",
    "elif_clause",
    "else_clause",
    "for_statement",
    "while_statement",
    "try_statement",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "with_statement",
    "match_statement",
    "case_clause",
];

/// Reusable extractor. Holds only the grammar, so one instance can be
/// shared by every worker thread; each call builds its own parser.
#[derive(Clone)]
pub struct PythonExtractor {
    language: Language,
}

impl PythonExtractor {
    pub fn new() -> ExtractResult<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ExtractError::Language(e.to_string()))?;
        Ok(Self { language })
    }

    /// Extracts from raw file bytes. Non UTF-8 input is a failed extraction.
    pub fn extract_bytes(&self, path: &str, bytes: &[u8]) -> Extraction {
        match std::str::from_utf8(bytes) {
            Ok(source) => self.extract(path, source),
            Err(_) => Extraction::Failed {
                file: SourceFile::empty(path, bytes),
                error: ExtractError::Encoding,
            },
        }
    }

    pub fn extract(&self, path: &str, source: &str) -> Extraction {
        let failed = |error| Extraction::Failed {
            file: SourceFile::empty(path, source.as_bytes()),
            error,
        };

        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&self.language) {
            return failed(ExtractError::Language(e.to_string()));
        }

        // A leading BOM is not part of the grammar.
        let text = source.strip_prefix('\u{feff}').unwrap_or(source);
        let Some(tree) = parser.parse(text, None) else {
            return failed(ExtractError::Aborted);
        };

        let root = tree.root_node();
        if root.has_error() {
            let (line, column) = first_error_position(root);
            tracing::debug!(path, line, column, "unparseable source");
            return failed(ExtractError::Syntax { line, column });
        }
        if let Some(error) = structural_error(root) {
            tracing::debug!(path, %error, "rejected source");
            return failed(error);
        }

        let mut walker = Walker {
            source: text,
            symbols: Vec::new(),
            imports: Vec::new(),
        };
        walker.walk_block(root, &Scope::Module, 0);

        let mut file = SourceFile::empty(path, source.as_bytes());
        file.language = PYTHON.to_string();
        file.symbols = walker.symbols;
        file.imports = walker.imports;
        Extraction::Parsed(file)
    }
}

#[derive(Debug, Clone)]
enum Scope {
    Module,
    Class(String),
    Function,
}

impl Scope {
    fn class_name(&self) -> Option<String> {
        match self {
            Scope::Class(name) => Some(name.clone()),
            Scope::Module | Scope::Function => None,
        }
    }
}

struct Walker<'s> {
    source: &'s str,
    symbols: Vec<Symbol>,
    imports: Vec<ImportRef>,
}

impl<'s> Walker<'s> {
    fn walk_block(&mut self, node: Node<'_>, scope: &Scope, depth: usize) {
        if depth > MAX_NESTING {
            tracing::trace!(depth, "nesting limit reached");
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_statement(child, scope, depth);
        }
    }

    fn walk_statement(&mut self, node: Node<'_>, scope: &Scope, depth: usize) {
        match node.kind() {
            "decorated_definition" => {
                let mut cursor = node.walk();
                let decorators: Vec<String> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .map(|c| collapse(self.text(c)))
                    .collect();
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.definition(definition, scope, depth, &decorators);
                }
            }
            "function_definition" | "class_definition" => {
                self.definition(node, scope, depth, &[]);
            }
            "import_statement" => self.plain_import(node),
            "import_from_statement" | "future_import_statement" => self.from_import(node),
            kind if COMPOUND_STATEMENTS.contains(&kind) => {
                self.walk_block(node, scope, depth + 1);
            }
            _ => {}
        }
    }

    fn definition(&mut self, node: Node<'_>, scope: &Scope, depth: usize, decorators: &[String]) {
        let Some(name) = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
        else {
            return;
        };
        let (line_start, line_end) = line_span(node);

        let (kind, signature, inner_scope) = if node.kind() == "class_definition" {
            let signature = self.class_signature(node, &name, decorators);
            (SymbolKind::Class, signature, Scope::Class(name.clone()))
        } else {
            let kind = match scope {
                Scope::Class(_) => SymbolKind::Method,
                Scope::Module | Scope::Function => SymbolKind::Function,
            };
            let signature = self.function_signature(node, &name, decorators);
            (kind, signature, Scope::Function)
        };

        self.symbols.push(Symbol {
            name,
            kind,
            line_start,
            line_end,
            signature,
            parent: scope.class_name(),
        });

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_block(body, &inner_scope, depth + 1);
        }
    }

    fn function_signature(&self, node: Node<'_>, name: &str, decorators: &[String]) -> String {
        let mut sig = decorator_prefix(decorators);

        let mut cursor = node.walk();
        if node.children(&mut cursor).any(|c| c.kind() == "async") {
            sig.push_str("async ");
        }
        sig.push_str("def ");
        sig.push_str(name);
        if let Some(type_params) = node.child_by_field_name("type_parameters") {
            sig.push_str(&collapse(self.text(type_params)));
        }

        sig.push('(');
        if let Some(params) = node.child_by_field_name("parameters") {
            sig.push_str(&self.parameters(params).join(", "));
        }
        sig.push(')');

        if let Some(ret) = node.child_by_field_name("return_type") {
            sig.push_str(" -> ");
            sig.push_str(&render_annotation(ret, self.source));
        }
        sig.push(':');
        sig
    }

    fn class_signature(&self, node: Node<'_>, name: &str, decorators: &[String]) -> String {
        let mut sig = decorator_prefix(decorators);
        sig.push_str("class ");
        sig.push_str(name);
        if let Some(type_params) = node.child_by_field_name("type_parameters") {
            sig.push_str(&collapse(self.text(type_params)));
        }

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            let bases: Vec<String> = superclasses
                .named_children(&mut cursor)
                .filter(|c| c.kind() != "comment")
                .map(|c| collapse(self.text(c)))
                .collect();
            if !bases.is_empty() {
                sig.push('(');
                sig.push_str(&bases.join(", "));
                sig.push(')');
            }
        }
        sig.push(':');
        sig
    }

    fn parameters(&self, params: Node<'_>) -> Vec<String> {
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter(|p| p.kind() != "comment")
            .map(|p| self.parameter(p))
            .collect()
    }

    fn parameter(&self, param: Node<'_>) -> String {
        match param.kind() {
            "typed_parameter" => {
                let mut cursor = param.walk();
                let target = param
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "type" && c.kind() != "comment")
                    .map(|c| collapse(self.text(c)))
                    .unwrap_or_default();
                match param.child_by_field_name("type") {
                    Some(ty) => format!("{}: {}", target, render_annotation(ty, self.source)),
                    None => target,
                }
            }
            "default_parameter" => {
                let name = self.field_text(param, "name");
                let value = self.field_text(param, "value");
                format!("{}={}", name, value)
            }
            "typed_default_parameter" => {
                let name = self.field_text(param, "name");
                let value = self.field_text(param, "value");
                match param.child_by_field_name("type") {
                    Some(ty) => format!(
                        "{}: {} = {}",
                        name,
                        render_annotation(ty, self.source),
                        value
                    ),
                    None => format!("{}={}", name, value),
                }
            }
            // identifiers, `*args`, `**kwargs`, bare `*` and `/`
            _ => collapse(self.text(param)),
        }
    }

    fn plain_import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let mut seen: Vec<String> = Vec::new();
        for name in node.children_by_field_name("name", &mut cursor) {
            let module = self.imported_name(name);
            if !module.is_empty() && !seen.contains(&module) {
                seen.push(module);
            }
        }
        self.imports.extend(seen.into_iter().map(ImportRef::plain));
    }

    fn from_import(&mut self, node: Node<'_>) {
        let (raw_module, level) = if node.kind() == "future_import_statement" {
            ("__future__".to_string(), 0)
        } else {
            match node.child_by_field_name("module_name") {
                Some(module) if module.kind() == "relative_import" => self.relative_module(module),
                Some(module) => (strip_spaces(self.text(module)), 0),
                None => (String::new(), 0),
            }
        };

        let mut names: Vec<String> = Vec::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let imported = self.imported_name(name);
            if !imported.is_empty() {
                names.push(imported);
            }
        }
        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            names.push("*".to_string());
        }

        self.imports
            .push(ImportRef::from_import(raw_module, level, names));
    }

    /// `...pkg.mod` → (`pkg.mod`, 3)
    fn relative_module(&self, node: Node<'_>) -> (String, usize) {
        let mut level = 0;
        let mut module = String::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "import_prefix" => {
                    level = self.text(child).chars().filter(|c| *c == '.').count();
                }
                "dotted_name" => module = strip_spaces(self.text(child)),
                _ => {}
            }
        }
        (module, level)
    }

    /// Module or member name of an import target, ignoring any `as` alias.
    fn imported_name(&self, node: Node<'_>) -> String {
        let target = if node.kind() == "aliased_import" {
            node.child_by_field_name("name").unwrap_or(node)
        } else {
            node
        };
        strip_spaces(self.text(target))
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|n| collapse(self.text(n)))
            .unwrap_or_default()
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

fn decorator_prefix(decorators: &[String]) -> String {
    let mut prefix = String::new();
    for decorator in decorators {
        prefix.push_str(decorator);
        prefix.push(' ');
    }
    prefix
}

fn strip_spaces(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 1-based inclusive line span of a node.
fn line_span(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let line_start = start.row + 1;
    // A node ending at column 0 stops before that line begins.
    let line_end = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    (line_start, line_end.max(line_start))
}

/// Position of the first ERROR or MISSING node, 1-based.
fn first_error_position(root: Node<'_>) -> (usize, usize) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            break;
        }
        let mut descended = false;
        if cursor.goto_first_child() {
            loop {
                if cursor.node().has_error() {
                    descended = true;
                    break;
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
            if !descended {
                cursor.goto_parent();
            }
        }
        if !descended {
            break;
        }
    }
    let position = cursor.node().start_position();
    (position.row + 1, position.column + 1)
}

/// Finds what the grammar accepts but Python rejects: Python 2 `print`
/// and `exec` statements, suites with no statement, and statements that
/// break indentation. Iterative so deeply nested input cannot overflow.
fn structural_error(root: Node<'_>) -> Option<ExtractError> {
    let mut cursor = root.walk();
    loop {
        if let Some(error) = node_error(cursor.node()) {
            return Some(error);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn node_error(node: Node<'_>) -> Option<ExtractError> {
    match node.kind() {
        "print_statement" | "exec_statement" => Some(syntax_at(node)),
        "function_definition" | "class_definition"
            if node.child_by_field_name("body").is_none() =>
        {
            Some(syntax_at(node))
        }
        "module" => suite_error(node, None),
        "block" => {
            let owner = node.parent().unwrap_or(node);
            suite_error(node, Some(owner))
        }
        _ => None,
    }
}

/// Statements of a suite start on one column: 0 at module level, deeper
/// than the owning statement inside a block. Statements sharing a line
/// after `;` are exempt.
fn suite_error(suite: Node<'_>, owner: Option<Node<'_>>) -> Option<ExtractError> {
    let mut cursor = suite.walk();
    let statements: Vec<Node<'_>> = suite
        .named_children(&mut cursor)
        .filter(|c| !c.is_extra())
        .collect();

    let Some(first) = statements.first() else {
        // An empty module is fine; an empty body is not.
        return owner.map(syntax_at);
    };
    let column = first.start_position().column;
    let misplaced = match owner {
        Some(owner) => column <= owner.start_position().column,
        None => column != 0,
    };
    if misplaced {
        return Some(indentation_at(*first));
    }

    let mut previous_row = first.end_position().row;
    for statement in &statements[1..] {
        let start = statement.start_position();
        if start.row > previous_row && start.column != column {
            return Some(indentation_at(*statement));
        }
        previous_row = statement.end_position().row;
    }
    None
}

fn syntax_at(node: Node<'_>) -> ExtractError {
    let position = node.start_position();
    ExtractError::Syntax {
        line: position.row + 1,
        column: position.column + 1,
    }
}

fn indentation_at(node: Node<'_>) -> ExtractError {
    let position = node.start_position();
    ExtractError::Indentation {
        line: position.row + 1,
        column: position.column + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ImportKind;

    fn parse(code: &str) -> SourceFile {
        let extractor = PythonExtractor::new().unwrap();
        match extractor.extract("test.py", code) {
            Extraction::Parsed(file) => file,
            Extraction::Failed { error, .. } => panic!("expected a parse, got {error}"),
        }
    }

    #[test]
    fn test_simple_function() {
        let file = parse("def hello(name: str) -> str:\n    return f'Hello {name}'\n");
        assert_eq!(file.language, "python");
        assert_eq!(file.symbols.len(), 1);
        let symbol = &file.symbols[0];
        assert_eq!(symbol.name, "hello");
        assert_eq!(symbol.kind, SymbolKind::Function);
        assert_eq!(symbol.signature, "def hello(name: str) -> str:");
        assert_eq!((symbol.line_start, symbol.line_end), (1, 2));
    }

    #[test]
    fn test_class_with_methods() {
        let code = r#"class Calculator:
    def __init__(self, initial: int = 0):
        self.value = initial

    def add(self, x: int, y: int) -> int:
        return x + y

    async def fetch_data(self) -> dict:
        pass
"#;
        let file = parse(code);
        assert_eq!(file.symbols.len(), 4);

        let class = &file.symbols[0];
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.parent, None);
        assert_eq!(class.signature, "class Calculator:");
        assert_eq!((class.line_start, class.line_end), (1, 9));

        let init = &file.symbols[1];
        assert_eq!(init.kind, SymbolKind::Method);
        assert_eq!(init.parent.as_deref(), Some("Calculator"));
        assert_eq!(init.signature, "def __init__(self, initial: int = 0):");

        assert_eq!(
            file.symbols[2].signature,
            "def add(self, x: int, y: int) -> int:"
        );
        assert_eq!(
            file.symbols[3].signature,
            "async def fetch_data(self) -> dict:"
        );
    }

    #[test]
    fn test_decorators_lead_the_signature() {
        let code = r#"@dataclass
class Point:
    x: int
    y: int

@staticmethod
def helper():
    pass

@app.route("/items", methods=["GET"])
@login_required
def items(request):
    pass
"#;
        let file = parse(code);
        assert_eq!(file.symbols[0].signature, "@dataclass class Point:");
        assert_eq!(file.symbols[0].line_start, 2);
        assert_eq!(file.symbols[1].signature, "@staticmethod def helper():");
        assert_eq!(
            file.symbols[2].signature,
            "@app.route(\"/items\", methods=[\"GET\"]) @login_required def items(request):"
        );
    }

    #[test]
    fn test_inheritance() {
        let code = "class Animal:\n    pass\n\nclass Dog(Animal):\n    pass\n\nclass Cat(Animal, Serializable):\n    pass\n\nclass Meta(Base, metaclass=ABCMeta):\n    pass\n";
        let file = parse(code);
        let signatures: Vec<&str> = file.symbols.iter().map(|s| s.signature.as_str()).collect();
        assert_eq!(
            signatures,
            vec![
                "class Animal:",
                "class Dog(Animal):",
                "class Cat(Animal, Serializable):",
                "class Meta(Base, metaclass=ABCMeta):",
            ]
        );
    }

    #[test]
    fn test_parameter_forms() {
        let code = "def f(a, b=1, *args, c: int, d: str = 'x', **kwargs) -> None:\n    pass\n\ndef g(a, /, b, *, c):\n    pass\n";
        let file = parse(code);
        assert_eq!(
            file.symbols[0].signature,
            "def f(a, b=1, *args, c: int, d: str = 'x', **kwargs) -> None:"
        );
        assert_eq!(file.symbols[1].signature, "def g(a, /, b, *, c):");
    }

    #[test]
    fn test_complex_annotations() {
        let code = r#"def process(
    data: Dict[str, List[Dict[str, Union[int, str, None]]]],
    config: Optional[Dict[str, List[int]]] = None,
    func: Callable[[int, str], bool] = None,
    mode: Literal["read", "write"] = "read",
) -> tuple[bool, str]:
    pass
"#;
        let file = parse(code);
        assert_eq!(file.symbols.len(), 1);
        let sig = &file.symbols[0].signature;
        assert!(sig.contains("data: Dict[str, List[Dict[str, Union[int, str, None]]]]"), "{sig}");
        assert!(sig.contains("config: Optional[Dict[str, List[int]]] = None"), "{sig}");
        assert!(sig.contains("func: Callable[[int, str], bool] = None"), "{sig}");
        assert!(sig.contains("mode: Literal[\"read\", \"write\"] = \"read\""), "{sig}");
        assert!(sig.ends_with("-> tuple[bool, str]:"), "{sig}");
    }

    #[test]
    fn test_union_and_forward_references() {
        let code = "def process(value: str | int, parent: 'Node') -> bool | None:\n    pass\n";
        let file = parse(code);
        assert_eq!(
            file.symbols[0].signature,
            "def process(value: str | int, parent: 'Node') -> bool | None:"
        );
    }

    #[test]
    fn test_ellipsis_and_dotted_annotations() {
        let code = "def variadic(args: Tuple[int, ...], when: datetime.datetime) -> None:\n    pass\n";
        let file = parse(code);
        assert_eq!(
            file.symbols[0].signature,
            "def variadic(args: Tuple[int, ...], when: datetime.datetime) -> None:"
        );
    }

    #[test]
    fn test_unrenderable_annotation_uses_placeholder() {
        let code = "def weird(x: 1 + 2, y: make_type()) -> []:\n    pass\n";
        let file = parse(code);
        assert_eq!(file.symbols.len(), 1);
        assert_eq!(file.symbols[0].signature, "def weird(x: Any, y: Any) -> []:");
    }

    #[test]
    fn test_no_annotations() {
        let file = parse("def old_style(a, b, c):\n    return a + b + c\n");
        assert_eq!(file.symbols[0].signature, "def old_style(a, b, c):");
    }

    #[test]
    fn test_nested_declarations() {
        let code = r#"class Outer:
    class Inner:
        def method(self):
            def local():
                pass
            return local

def top():
    class Local:
        def run(self):
            pass
    return Local

if TYPE_CHECKING:
    def guarded():
        pass
"#;
        let file = parse(code);
        let summary: Vec<(&str, SymbolKind, Option<&str>)> = file
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.parent.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Outer", SymbolKind::Class, None),
                ("Inner", SymbolKind::Class, Some("Outer")),
                ("method", SymbolKind::Method, Some("Inner")),
                ("local", SymbolKind::Function, None),
                ("top", SymbolKind::Function, None),
                ("Local", SymbolKind::Class, None),
                ("run", SymbolKind::Method, Some("Local")),
                ("guarded", SymbolKind::Function, None),
            ]
        );
    }

    #[test]
    fn test_symbol_invariants_hold() {
        let code = r#"class Container(Generic[T]):
    def get(self) -> T:
        pass

    def set(self, value: T) -> None:
        pass

@property
def value(self):
    return self._value
"#;
        let file = parse(code);
        assert!(file.symbols.len() >= 3);
        for (i, symbol) in file.symbols.iter().enumerate() {
            assert!(symbol.line_end >= symbol.line_start);
            assert!(!symbol.signature.is_empty());
            if let Some(parent) = &symbol.parent {
                assert!(
                    file.symbols[..i]
                        .iter()
                        .any(|s| &s.name == parent && s.kind.is_class_like())
                );
            }
            if i > 0 {
                assert!(file.symbols[i - 1].line_start <= symbol.line_start);
            }
        }
    }

    #[test]
    fn test_imports() {
        let code = r#"import os
import sys, os.path as osp
from pathlib import Path
from typing import List, Dict
from . import utils, config
from .. import parent_utils
from ...parent import helper as h
from .models import *
"#;
        let file = parse(code);
        let imports = &file.imports;
        assert_eq!(imports.len(), 9);

        assert_eq!(imports[0], ImportRef::plain("os"));
        assert_eq!(imports[1], ImportRef::plain("sys"));
        assert_eq!(imports[2], ImportRef::plain("os.path"));
        assert_eq!(imports[3], ImportRef::from_import("pathlib", 0, ["Path"]));
        assert_eq!(
            imports[4],
            ImportRef::from_import("typing", 0, ["List", "Dict"])
        );
        assert_eq!(
            imports[5],
            ImportRef::from_import("", 1, ["utils", "config"])
        );
        assert_eq!(imports[6], ImportRef::from_import("", 2, ["parent_utils"]));
        assert_eq!(imports[7].raw_module, "parent");
        assert_eq!(imports[7].relative_level, 3);
        assert!(imports[7].imported_names.contains("helper"));
        assert_eq!(imports[8], ImportRef::from_import("models", 1, ["*"]));
    }

    #[test]
    fn test_wildcard_and_nested_imports() {
        let code = r#"from __future__ import annotations
from .models import *

def lazy():
    import json
    from .. import core
"#;
        let file = parse(code);
        assert_eq!(file.imports.len(), 4);
        assert_eq!(file.imports[0].raw_module, "__future__");
        assert_eq!(file.imports[1].kind, ImportKind::From);
        assert!(file.imports[1].imported_names.contains("*"));
        assert_eq!(file.imports[2], ImportRef::plain("json"));
        assert_eq!(file.imports[3], ImportRef::from_import("", 2, ["core"]));
    }

    #[test]
    fn test_syntax_error_fails_whole_file() {
        let extractor = PythonExtractor::new().unwrap();
        let result = extractor.extract("broken.py", "def broken(\n");
        assert!(!result.is_parsed());
        assert!(matches!(result.error(), Some(ExtractError::Syntax { .. })));
        assert!(result.file().symbols.is_empty());
        assert!(result.file().imports.is_empty());
        assert_eq!(result.file().path, "broken.py");
    }

    #[test]
    fn test_error_in_the_middle_reports_its_line() {
        let code = "def valid():\n    return 42\n\nclass MyClass\n    def __init__(self):\n        pass\n";
        let extractor = PythonExtractor::new().unwrap();
        match extractor.extract("mid.py", code) {
            Extraction::Failed {
                error: ExtractError::Syntax { line, .. },
                file,
            } => {
                assert!(line >= 1, "error reported at line {line}");
                assert!(file.symbols.is_empty());
            }
            other => panic!("expected a syntax failure, got {other:?}"),
        }
    }

    #[test]
    fn test_grammar_accepted_but_invalid_python_fails() {
        let extractor = PythonExtractor::new().unwrap();
        let cases = [
            (
                "incomplete function",
                "\ndef process_data(data):\n    result = data.map(lambda x:\n    # Missing closing parenthesis and function body\n",
            ),
            (
                "unclosed string",
                "\ndef hello():\n    message = \"Hello world\n    print(message)\n",
            ),
            (
                "invalid indentation",
                "\ndef calculate():\n    x = 1\n  y = 2  # Wrong indentation\n    return x + y\n",
            ),
            (
                "missing colon",
                "\nclass MyClass\n    def __init__(self):\n        pass\n",
            ),
            (
                "body is only a comment",
                "\nclass DataProcessor:\n    def process(self, data):\n        # Function body missing\n",
            ),
            (
                "mixed tabs and spaces",
                "\ndef mixed_indent():\n\tx = 1  # Tab\n    y = 2  # Spaces\n\treturn x + y  # Tab\n",
            ),
            (
                "incomplete import",
                "\nfrom django.db import\n# Missing what to import\n",
            ),
            (
                "error in the middle",
                "\ndef valid_function():\n    return 42\n\ndef broken_function(\n    # Missing closing parenthesis\n\ndef another_valid():\n    return \"ok\"\n",
            ),
            (
                "incomplete decorator",
                "\n@dataclass\nclass Point:\n    x: int\n    y: int\n\n@  # Incomplete decorator\ndef process():\n    pass\n",
            ),
            ("python 2 print", "def show():\n    print \"x\"\n"),
            ("python 2 exec", "def run():\n    exec \"x = 1\"\n"),
            ("indented module statement", "  x = 1\ndef f():\n    pass\n"),
        ];
        for (name, code) in cases {
            let result = extractor.extract("case.py", code);
            assert!(!result.is_parsed(), "{name} should fail");
            assert!(result.file().symbols.is_empty(), "{name} leaked symbols");
            assert!(result.file().imports.is_empty(), "{name} leaked imports");
        }

        let result = extractor.extract("indent.py", "def f():\n    x = 1\n  y = 2\n");
        assert_eq!(
            result.error(),
            Some(&ExtractError::Indentation { line: 3, column: 3 })
        );
    }

    #[test]
    fn test_valid_layouts_still_parse() {
        let code = "\
def hello(name: str) -> str:
    return f\"Hello, {name}!\"

class Greeter:
    def greet(self, name):
        return hello(name)

def one_liner(): return 1
class Empty: pass
x = 1; y = 2
if x: a = 1; b = 2
else:
    pass

def tabbed():
\tprint(\"tab\")
\treturn None

def commented():
        # a comment deeper than the body
    value = [
  1,
            2,
    ]
    return value

match command:
    case \"go\":
        pass
    case _:
        exec(\"pass\")
";
        let file = parse(code);
        let names: Vec<&str> = file.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["hello", "Greeter", "greet", "one_liner", "Empty", "tabbed", "commented"]
        );
    }

    #[test]
    fn test_invalid_utf8_is_a_failure() {
        let extractor = PythonExtractor::new().unwrap();
        let result = extractor.extract_bytes("bin.py", &[0x64, 0x65, 0x66, 0xff, 0xfe]);
        assert_eq!(result.error(), Some(&ExtractError::Encoding));
        assert_eq!(result.file().byte_size, 5);
    }

    #[test]
    fn test_empty_file_parses_with_no_symbols() {
        let file = parse("");
        assert!(file.symbols.is_empty());
        assert!(file.imports.is_empty());
        assert_eq!(file.byte_size, 0);
    }

    #[test]
    fn test_extractor_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PythonExtractor>();
    }
}
