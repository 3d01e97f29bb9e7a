//! Python front end using tree-sitter
//!
//! Lowers the concrete tree into the closed AST in [`super::ast`].

use super::ast::*;
use crate::error::ParseError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tree_sitter::{Node as TsNode, Parser};

/// Parse Python source code into a [`Module`]
pub fn parse_source(source: &str, path: &Path, module_name: &str) -> Result<Module, ParseError> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    parser
        .set_language(&language.into())
        .map_err(|e| ParseError::Parser(e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::Parser("tree-sitter returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ParseError::Syntax {
            path: path.to_path_buf(),
            line: first_error_line(root).unwrap_or(1),
        });
    }

    let lowering = Lowering {
        source: source.as_bytes(),
    };
    let body = lowering.block(root, &mut Vec::new(), false);
    let indirect_bindings = lowering.indirect_bindings(root, BindingScope::Module);
    let duplicate_definitions = duplicate_definitions(&body);

    Ok(Module {
        path: path.to_path_buf(),
        name: module_name.to_string(),
        body,
        indirect_bindings,
        duplicate_definitions,
    })
}

/// Whether `source` is syntactically valid Python
pub fn is_valid(source: &str) -> bool {
    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .is_err()
    {
        return false;
    }
    parser
        .parse(source, None)
        .is_some_and(|tree| !tree.root_node().has_error())
}

fn first_error_line(node: TsNode) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

/// Qualified names defined more than once (property setters, `if`/`else` defs)
fn duplicate_definitions(body: &[Stmt]) -> BTreeSet<String> {
    fn count<'a>(stmts: &'a [Stmt], seen: &mut BTreeMap<&'a str, usize>) {
        for stmt in stmts {
            match stmt {
                Stmt::FunctionDef(f) => {
                    *seen.entry(f.qualname.as_str()).or_default() += 1;
                    count(&f.body, seen);
                }
                Stmt::ClassDef(c) => {
                    *seen.entry(c.qualname.as_str()).or_default() += 1;
                    count(&c.body, seen);
                }
                Stmt::Compound(c) => {
                    for block in &c.blocks {
                        count(block, seen);
                    }
                }
                _ => {}
            }
        }
    }

    let mut seen = BTreeMap::new();
    count(body, &mut seen);
    seen.into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(qualname, _)| qualname.to_string())
        .collect()
}

/// Scope whose bindings are being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingScope {
    Module,
    Function,
}

impl BindingScope {
    /// Statement an inner function uses to rebind a name of this scope
    fn rebinding_statement(self) -> &'static str {
        match self {
            BindingScope::Module => "global_statement",
            BindingScope::Function => "nonlocal_statement",
        }
    }
}

fn span_of(node: TsNode) -> Span {
    let start = node.start_position();
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        line: start.row as u32 + 1,
        column: start.column as u32,
    }
}

struct Lowering<'s> {
    source: &'s [u8],
}

impl<'s> Lowering<'s> {
    fn text(&self, node: TsNode) -> String {
        node.utf8_text(self.source).unwrap_or("").to_string()
    }

    /// Lower the statements of a module or block. `scope` holds the enclosing
    /// definition names for qualnames.
    fn block(&self, node: TsNode, scope: &mut Vec<String>, in_class: bool) -> Vec<Stmt> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter_map(|child| self.stmt(child, scope, in_class))
            .collect()
    }

    fn stmt(&self, node: TsNode, scope: &mut Vec<String>, in_class: bool) -> Option<Stmt> {
        let span = span_of(node);
        let stmt = match node.kind() {
            "function_definition" => {
                Stmt::FunctionDef(self.function(node, Vec::new(), span, scope, in_class)?)
            }
            "class_definition" => Stmt::ClassDef(self.class(node, Vec::new(), span, scope)?),
            "decorated_definition" => {
                let mut cursor = node.walk();
                let decorators: Vec<Decorator> = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .filter_map(|d| {
                        let mut inner = d.walk();
                        let expr = d
                            .named_children(&mut inner)
                            .find(|c| c.kind() != "comment")?;
                        Some(Decorator {
                            expr: self.expr(expr),
                            span: span_of(d),
                        })
                    })
                    .collect();
                let definition = node.child_by_field_name("definition")?;
                match definition.kind() {
                    "function_definition" => Stmt::FunctionDef(
                        self.function(definition, decorators, span, scope, in_class)?,
                    ),
                    "class_definition" => {
                        Stmt::ClassDef(self.class(definition, decorators, span, scope)?)
                    }
                    _ => Stmt::Other(span),
                }
            }
            "import_statement" => Stmt::Import(self.import(node, span)),
            "import_from_statement" => Stmt::Import(self.import_from(node, span)),
            "future_import_statement" => {
                let mut cursor = node.walk();
                let names = node
                    .children_by_field_name("name", &mut cursor)
                    .filter_map(|n| self.imported_name(n))
                    .collect();
                Stmt::Import(Import {
                    from_module: Some("__future__".to_string()),
                    level: 0,
                    names,
                    wildcard: false,
                    span,
                })
            }
            "return_statement" => {
                let mut cursor = node.walk();
                let value = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "comment")
                    .map(|c| self.expr(c));
                Stmt::Return(Return { value, span })
            }
            "expression_statement" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "comment")?;
                match inner.kind() {
                    "assignment" => Stmt::Assign(self.assignment(inner, span)),
                    "augmented_assignment" => Stmt::Other(span),
                    _ => Stmt::Expr(self.expr(inner)),
                }
            }
            "if_statement" => self.compound(node, CompoundKind::If, scope, in_class),
            "for_statement" => self.compound(node, CompoundKind::For, scope, in_class),
            "while_statement" => self.compound(node, CompoundKind::While, scope, in_class),
            "try_statement" => self.compound(node, CompoundKind::Try, scope, in_class),
            "with_statement" => self.compound(node, CompoundKind::With, scope, in_class),
            "match_statement" | "case_clause" => {
                self.compound(node, CompoundKind::Match, scope, in_class)
            }
            "comment" => Stmt::Comment(Comment {
                text: self.text(node),
                span,
            }),
            "pass_statement" => Stmt::Pass(span),
            "raise_statement" => Stmt::Raise(span),
            _ => Stmt::Other(span),
        };
        Some(stmt)
    }

    fn compound(
        &self,
        node: TsNode,
        kind: CompoundKind,
        scope: &mut Vec<String>,
        in_class: bool,
    ) -> Stmt {
        let mut blocks = Vec::new();
        let mut heads = Vec::new();
        self.collect_blocks(node, scope, in_class, &mut blocks, &mut heads);
        Stmt::Compound(Compound {
            kind,
            heads,
            blocks,
            span: span_of(node),
        })
    }

    fn collect_blocks(
        &self,
        node: TsNode,
        scope: &mut Vec<String>,
        in_class: bool,
        out: &mut Vec<Vec<Stmt>>,
        heads: &mut Vec<Expr>,
    ) {
        for field in ["condition", "right", "subject"] {
            if let Some(head) = node.child_by_field_name(field) {
                heads.push(self.expr(head));
            }
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block" => out.push(self.block(child, scope, in_class)),
                "with_item" => {
                    if let Some(value) = child.child_by_field_name("value") {
                        heads.push(self.expr(value));
                    }
                }
                kind if kind.ends_with("_clause") => {
                    self.collect_blocks(child, scope, in_class, out, heads)
                }
                _ => {}
            }
        }
    }

    fn function(
        &self,
        node: TsNode,
        decorators: Vec<Decorator>,
        header: Span,
        scope: &mut Vec<String>,
        is_method: bool,
    ) -> Option<FunctionDef> {
        let name = self.text(node.child_by_field_name("name")?);
        let params_node = node.child_by_field_name("parameters")?;
        let returns = node.child_by_field_name("return_type").map(|t| Annotation {
            text: self.text(t),
            span: span_of(t),
        });
        let is_async = node
            .child(0)
            .is_some_and(|first| first.kind() == "async");

        scope.push(name.clone());
        let qualname = scope.join(".");
        let body_node = node.child_by_field_name("body");
        let body = body_node
            .map(|b| self.block(b, scope, false))
            .unwrap_or_default();
        scope.pop();

        Some(FunctionDef {
            name,
            qualname,
            decorators,
            params: self.params(params_node),
            params_span: span_of(params_node),
            returns,
            body,
            is_async,
            is_method,
            is_generator: body_node.is_some_and(contains_yield),
            indirect_bindings: body_node
                .map(|b| self.indirect_bindings(b, BindingScope::Function))
                .unwrap_or_default(),
            span: span_of(node),
            header,
        })
    }

    fn params(&self, node: TsNode) -> Vec<Param> {
        let mut cursor = node.walk();
        let mut params = Vec::new();
        for child in node.named_children(&mut cursor) {
            let span = span_of(child);
            let param = match child.kind() {
                "identifier" => Param {
                    name: self.text(child),
                    kind: ParamKind::Positional,
                    annotation: None,
                    default: None,
                    span,
                    name_span: span,
                },
                "typed_parameter" => {
                    let mut inner = child.walk();
                    let Some(target) = child.named_children(&mut inner).next() else {
                        continue;
                    };
                    let (name, kind, name_span) = self.param_target(target);
                    Param {
                        name,
                        kind,
                        annotation: self.annotation(child),
                        default: None,
                        span,
                        name_span,
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name_node) = child.child_by_field_name("name") else {
                        continue;
                    };
                    Param {
                        name: self.text(name_node),
                        kind: ParamKind::Positional,
                        annotation: self.annotation(child),
                        default: child.child_by_field_name("value").map(|v| self.expr(v)),
                        span,
                        name_span: span_of(name_node),
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    let (name, kind, name_span) = self.param_target(child);
                    Param {
                        name,
                        kind,
                        annotation: None,
                        default: None,
                        span,
                        name_span,
                    }
                }
                _ => continue,
            };
            params.push(param);
        }
        params
    }

    fn param_target(&self, node: TsNode) -> (String, ParamKind, Span) {
        let kind = match node.kind() {
            "list_splat_pattern" => ParamKind::VarArgs,
            "dictionary_splat_pattern" => ParamKind::KwArgs,
            _ => ParamKind::Positional,
        };
        let name_node = if kind == ParamKind::Positional {
            node
        } else {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "identifier");
            found.unwrap_or(node)
        };
        (self.text(name_node), kind, span_of(name_node))
    }

    fn annotation(&self, node: TsNode) -> Option<Annotation> {
        node.child_by_field_name("type").map(|t| Annotation {
            text: self.text(t),
            span: span_of(t),
        })
    }

    fn class(
        &self,
        node: TsNode,
        decorators: Vec<Decorator>,
        header: Span,
        scope: &mut Vec<String>,
    ) -> Option<ClassDef> {
        let name = self.text(node.child_by_field_name("name")?);
        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|c| !matches!(c.kind(), "keyword_argument" | "comment"))
                    .map(|c| self.expr(c))
                    .collect()
            })
            .unwrap_or_default();

        scope.push(name.clone());
        let qualname = scope.join(".");
        let body = node
            .child_by_field_name("body")
            .map(|b| self.block(b, scope, true))
            .unwrap_or_default();
        scope.pop();

        Some(ClassDef {
            name,
            qualname,
            decorators,
            bases,
            body,
            span: span_of(node),
            header,
        })
    }

    fn imported_name(&self, node: TsNode) -> Option<ImportedName> {
        match node.kind() {
            "dotted_name" | "identifier" => Some(ImportedName {
                name: self.text(node),
                alias: None,
            }),
            "aliased_import" => Some(ImportedName {
                name: self.text(node.child_by_field_name("name")?),
                alias: node.child_by_field_name("alias").map(|a| self.text(a)),
            }),
            _ => None,
        }
    }

    fn import(&self, node: TsNode, span: Span) -> Import {
        let mut cursor = node.walk();
        let names = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|n| self.imported_name(n))
            .collect();
        Import {
            from_module: None,
            level: 0,
            names,
            wildcard: false,
            span,
        }
    }

    fn import_from(&self, node: TsNode, span: Span) -> Import {
        let raw = node
            .child_by_field_name("module_name")
            .map(|m| self.text(m))
            .unwrap_or_default();
        let level = raw.chars().take_while(|c| *c == '.').count() as u32;
        let module = raw.trim_start_matches('.').to_string();

        let mut cursor = node.walk();
        let names = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|n| self.imported_name(n))
            .collect();
        let mut cursor = node.walk();
        let wildcard = node
            .children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import");

        Import {
            from_module: Some(module),
            level,
            names,
            wildcard,
            span,
        }
    }

    fn assignment(&self, node: TsNode, span: Span) -> Assign {
        let targets = node
            .child_by_field_name("left")
            .map(|left| match left.kind() {
                "identifier" | "attribute" => vec![self.text(left)],
                _ => {
                    let mut cursor = left.walk();
                    left.named_children(&mut cursor)
                        .filter(|c| c.kind() == "identifier")
                        .map(|c| self.text(c))
                        .collect()
                }
            })
            .unwrap_or_default();
        Assign {
            targets,
            annotation: self.annotation(node),
            value: node.child_by_field_name("right").map(|r| self.expr(r)),
            span,
        }
    }

    fn expr(&self, node: TsNode) -> Expr {
        let span = span_of(node);
        match node.kind() {
            "string" => {
                let text = self.text(node);
                let prefix: String = text
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect::<String>()
                    .to_ascii_lowercase();
                let lit = if prefix.contains('b') {
                    Literal::Bytes
                } else if prefix.contains('f') {
                    Literal::FStr
                } else {
                    Literal::Str
                };
                Expr::Literal(lit, span)
            }
            "concatenated_string" => Expr::Literal(Literal::Str, span),
            "integer" => Expr::Literal(Literal::Int, span),
            "float" => Expr::Literal(Literal::Float, span),
            "true" => Expr::Literal(Literal::Bool(true), span),
            "false" => Expr::Literal(Literal::Bool(false), span),
            "none" => Expr::Literal(Literal::None, span),
            "ellipsis" => Expr::Literal(Literal::Ellipsis, span),
            "identifier" => Expr::Name(self.text(node), span),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => Expr::Attribute {
                    value: Box::new(self.expr(object)),
                    attr: self.text(attr),
                    span,
                },
                _ => Expr::Other(span),
            },
            "call" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return Expr::Other(span);
                };
                let mut args = Vec::new();
                let mut keywords = Vec::new();
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    if arguments.kind() == "argument_list" {
                        let mut cursor = arguments.walk();
                        for arg in arguments.named_children(&mut cursor) {
                            match arg.kind() {
                                "comment" => {}
                                "keyword_argument" => {
                                    if let (Some(name), Some(value)) = (
                                        arg.child_by_field_name("name"),
                                        arg.child_by_field_name("value"),
                                    ) {
                                        keywords.push(Keyword {
                                            name: self.text(name),
                                            value: self.expr(value),
                                        });
                                    }
                                }
                                _ => args.push(self.expr(arg)),
                            }
                        }
                    }
                }
                Expr::Call {
                    func: Box::new(self.expr(func)),
                    args,
                    keywords,
                    span,
                }
            }
            "list" | "list_comprehension" => self.collection(node, CollectionKind::List),
            "dictionary" | "dictionary_comprehension" => {
                self.collection(node, CollectionKind::Dict)
            }
            "set" | "set_comprehension" => self.collection(node, CollectionKind::Set),
            "tuple" | "expression_list" => self.collection(node, CollectionKind::Tuple),
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "comment");
                match inner {
                    Some(inner) => self.expr(inner),
                    None => Expr::Other(span),
                }
            }
            "unary_operator" => match node.child_by_field_name("argument") {
                Some(arg) if matches!(arg.kind(), "integer" | "float") => self.expr(arg),
                _ => Expr::Other(span),
            },
            _ => Expr::Other(span),
        }
    }

    /// Names `body` binds through anything but a single-name assignment
    /// statement. Nested definitions are not entered, except to find the
    /// statements they use to rebind names of this scope.
    fn indirect_bindings(&self, body: TsNode, scope: BindingScope) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.scan_bindings(body, scope, &mut names);
        names
    }

    fn scan_bindings(&self, node: TsNode, scope: BindingScope, names: &mut BTreeSet<String>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" | "class_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        names.insert(self.text(name));
                    }
                    self.scan_statements(child, scope.rebinding_statement(), names);
                    continue;
                }
                "lambda" => continue,
                "assignment" => {
                    let statement = child
                        .parent()
                        .is_some_and(|p| p.kind() == "expression_statement");
                    if let Some(left) = child.child_by_field_name("left") {
                        if !statement || !matches!(left.kind(), "identifier" | "attribute") {
                            self.collect_names(left, names);
                        }
                    }
                }
                "augmented_assignment" | "for_statement" => {
                    if let Some(left) = child.child_by_field_name("left") {
                        self.collect_names(left, names);
                    }
                }
                "named_expression" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        names.insert(self.text(name));
                    }
                }
                "as_pattern" | "except_clause" => {
                    if let Some(alias) = child.child_by_field_name("alias") {
                        self.collect_names(alias, names);
                    }
                }
                "global_statement" | "nonlocal_statement" | "delete_statement" | "case_pattern" => {
                    self.collect_names(child, names);
                    continue;
                }
                "import_statement" | "import_from_statement" => {
                    let import = if child.kind() == "import_statement" {
                        self.import(child, span_of(child))
                    } else {
                        self.import_from(child, span_of(child))
                    };
                    names.extend(import.names.iter().map(|n| n.bound_name().to_string()));
                    continue;
                }
                _ => {}
            }
            self.scan_bindings(child, scope, names);
        }
    }

    /// Names declared by every `kind` statement anywhere below `node`
    fn scan_statements(&self, node: TsNode, kind: &str, names: &mut BTreeSet<String>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == kind {
                self.collect_names(child, names);
            } else {
                self.scan_statements(child, kind, names);
            }
        }
    }

    /// Identifiers bound by a target pattern; attribute and subscript
    /// targets bind no name.
    fn collect_names(&self, node: TsNode, names: &mut BTreeSet<String>) {
        match node.kind() {
            "identifier" => {
                names.insert(self.text(node));
            }
            "attribute" | "subscript" => {}
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.collect_names(child, names);
                }
            }
        }
    }

    fn collection(&self, node: TsNode, kind: CollectionKind) -> Expr {
        let mut cursor = node.walk();
        let items = if node.kind().ends_with("_comprehension") {
            Vec::new()
        } else {
            node.named_children(&mut cursor)
                .filter(|c| c.kind() != "comment")
                .map(|c| self.expr(c))
                .collect()
        };
        Expr::Collection(kind, items, span_of(node))
    }
}

/// `yield` anywhere in the body except nested scopes
fn contains_yield(node: TsNode) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "yield" => return true,
            "function_definition" | "class_definition" | "lambda" | "decorated_definition" => {}
            _ => {
                if contains_yield(child) {
                    return true;
                }
            }
        }
    }
    false
}
