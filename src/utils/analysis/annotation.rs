//! Type annotation rendering.
//!
//! Annotations are arbitrary expressions. They are lowered from the syntax
//! tree into [`TypeExpr`], a closed set of shapes the map cares about, and
//! rendered back to text. Anything outside that set becomes
//! [`TypeExpr::Unknown`] and renders as [`PLACEHOLDER`], so one odd
//! annotation never costs the whole declaration.

use tree_sitter::Node;

/// Text substituted for annotation shapes that cannot be rendered.
pub const PLACEHOLDER: &str = "Any";

/// Lowering stops descending past this depth.
const MAX_DEPTH: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `int`, `None`, `T`
    Name(String),
    /// `typing.List`
    Attribute(Box<TypeExpr>, String),
    /// `Dict[str, int]`
    Subscript(Box<TypeExpr>, Vec<TypeExpr>),
    /// `str | None`
    Union(Vec<TypeExpr>),
    /// `[int, str]`, as in `Callable[[int, str], bool]`
    List(Vec<TypeExpr>),
    /// `(int, str)`
    Tuple(Vec<TypeExpr>),
    /// `*Ts`, `**P`
    Splat(&'static str, Box<TypeExpr>),
    /// String forward references and `Literal[...]` members, kept verbatim
    Literal(String),
    /// `...`
    Ellipsis,
    Unknown,
}

impl TypeExpr {
    /// Lowers an annotation node (usually a `type` node).
    pub fn lower(node: Node<'_>, source: &str) -> Self {
        lower(node, source, 0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        match self {
            TypeExpr::Name(name) => out.push_str(name),
            TypeExpr::Attribute(object, attr) => {
                object.write_to(out);
                out.push('.');
                out.push_str(attr);
            }
            TypeExpr::Subscript(value, args) => {
                value.write_to(out);
                out.push('[');
                write_joined(args, ", ", out);
                out.push(']');
            }
            TypeExpr::Union(members) => write_joined(members, " | ", out),
            TypeExpr::List(items) => {
                out.push('[');
                write_joined(items, ", ", out);
                out.push(']');
            }
            TypeExpr::Tuple(items) => {
                out.push('(');
                write_joined(items, ", ", out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            TypeExpr::Splat(prefix, inner) => {
                out.push_str(prefix);
                inner.write_to(out);
            }
            TypeExpr::Literal(text) => out.push_str(text),
            TypeExpr::Ellipsis => out.push_str("..."),
            TypeExpr::Unknown => out.push_str(PLACEHOLDER),
        }
    }
}

fn write_joined(items: &[TypeExpr], sep: &str, out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        item.write_to(out);
    }
}

/// Renders an annotation node straight to text.
pub fn render_annotation(node: Node<'_>, source: &str) -> String {
    TypeExpr::lower(node, source).render()
}

fn lower(node: Node<'_>, source: &str, depth: usize) -> TypeExpr {
    if depth > MAX_DEPTH || node.has_error() {
        return TypeExpr::Unknown;
    }
    let next = depth + 1;

    match node.kind() {
        "type" | "parenthesized_expression" => match first_named(node) {
            Some(inner) => lower(inner, source, next),
            None => TypeExpr::Unknown,
        },
        "identifier" => text(node, source).map_or(TypeExpr::Unknown, TypeExpr::Name),
        "none" | "true" | "false" => {
            text(node, source).map_or(TypeExpr::Unknown, TypeExpr::Name)
        }
        "attribute" => {
            let object = node.child_by_field_name("object");
            let attr = node
                .child_by_field_name("attribute")
                .and_then(|a| text(a, source));
            match (object, attr) {
                (Some(object), Some(attr)) => {
                    TypeExpr::Attribute(Box::new(lower(object, source, next)), attr)
                }
                _ => TypeExpr::Unknown,
            }
        }
        "member_type" => {
            let mut cursor = node.walk();
            let parts: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            match parts.as_slice() {
                [object, attr] => match text(*attr, source) {
                    Some(attr) => TypeExpr::Attribute(Box::new(lower(*object, source, next)), attr),
                    None => TypeExpr::Unknown,
                },
                _ => TypeExpr::Unknown,
            }
        }
        "subscript" => {
            let Some(value) = node.child_by_field_name("value") else {
                return TypeExpr::Unknown;
            };
            let mut cursor = node.walk();
            let args: Vec<TypeExpr> = node
                .children_by_field_name("subscript", &mut cursor)
                .map(|arg| lower(arg, source, next))
                .collect();
            TypeExpr::Subscript(Box::new(lower(value, source, next)), args)
        }
        "generic_type" => {
            let mut cursor = node.walk();
            let mut head = None;
            let mut args = Vec::new();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "type_parameter" {
                    let mut inner = child.walk();
                    args.extend(
                        child
                            .named_children(&mut inner)
                            .filter(|c| c.kind() != "comment")
                            .map(|c| lower(c, source, next)),
                    );
                } else if head.is_none() {
                    head = Some(lower(child, source, next));
                }
            }
            match head {
                Some(head) => TypeExpr::Subscript(Box::new(head), args),
                None => TypeExpr::Unknown,
            }
        }
        "union_type" => {
            let mut members = Vec::new();
            flatten_union(node, source, next, &mut members);
            TypeExpr::Union(members)
        }
        "binary_operator" => {
            let is_union = node
                .child_by_field_name("operator")
                .is_some_and(|op| op.kind() == "|");
            if !is_union {
                return TypeExpr::Unknown;
            }
            let mut members = Vec::new();
            flatten_union(node, source, next, &mut members);
            TypeExpr::Union(members)
        }
        "list" => TypeExpr::List(lower_children(node, source, next)),
        "tuple" => TypeExpr::Tuple(lower_children(node, source, next)),
        "splat_type" | "list_splat" | "dictionary_splat" => {
            let prefix = if text(node, source).is_some_and(|t| t.starts_with("**")) {
                "**"
            } else {
                "*"
            };
            match first_named(node) {
                Some(inner) => TypeExpr::Splat(prefix, Box::new(lower(inner, source, next))),
                None => TypeExpr::Unknown,
            }
        }
        "string" | "concatenated_string" | "integer" | "float" => {
            text(node, source).map_or(TypeExpr::Unknown, |t| TypeExpr::Literal(collapse(&t)))
        }
        "unary_operator" => {
            // Negative literals, e.g. `Literal[-1]`
            match node.child_by_field_name("argument") {
                Some(arg) if matches!(arg.kind(), "integer" | "float") => {
                    text(node, source).map_or(TypeExpr::Unknown, |t| TypeExpr::Literal(collapse(&t)))
                }
                _ => TypeExpr::Unknown,
            }
        }
        "ellipsis" => TypeExpr::Ellipsis,
        _ => TypeExpr::Unknown,
    }
}

fn flatten_union(node: Node<'_>, source: &str, depth: usize, out: &mut Vec<TypeExpr>) {
    if depth > MAX_DEPTH {
        out.push(TypeExpr::Unknown);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        let nested_union = child.kind() == "union_type"
            || (child.kind() == "binary_operator"
                && child
                    .child_by_field_name("operator")
                    .is_some_and(|op| op.kind() == "|"));
        if nested_union {
            flatten_union(child, source, depth + 1, out);
        } else if child.kind() == "type" {
            match first_named(child) {
                Some(inner) if inner.kind() == "union_type" => {
                    flatten_union(inner, source, depth + 1, out)
                }
                _ => out.push(lower(child, source, depth)),
            }
        } else {
            out.push(lower(child, source, depth));
        }
    }
}

fn lower_children(node: Node<'_>, source: &str, depth: usize) -> Vec<TypeExpr> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .map(|c| lower(c, source, depth))
        .collect()
}

fn first_named(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    found
}

fn text(node: Node<'_>, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

/// Collapses every whitespace run to a single space.
pub fn collapse(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
