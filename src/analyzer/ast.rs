//! Closed syntax tree for Python modules
//!
//! The tree-sitter concrete tree is lowered into these types once per parse.
//! Every node kind the rules care about has its own variant, so rule code
//! matches exhaustively instead of probing attributes.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Byte range plus the 1-based line / 0-based column of its start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub line: u32,
    pub column: u32,
}

/// A parsed source file
#[derive(Debug, Clone)]
pub struct Module {
    /// Path relative to the analyzer root when possible
    pub path: PathBuf,
    /// Dotted module name (`app.domain.user`)
    pub name: String,
    pub body: Vec<Stmt>,
    /// Top-level names also bound by something other than a single-name
    /// assignment: loops, `with` targets, walrus, `global` in a function
    pub indirect_bindings: BTreeSet<String>,
    /// Qualified names that more than one function or class definition uses
    pub duplicate_definitions: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Import(Import),
    Return(Return),
    Assign(Assign),
    Expr(Expr),
    Compound(Compound),
    Comment(Comment),
    Pass(Span),
    Raise(Span),
    Other(Span),
}

#[derive(Debug, Clone)]
pub struct Decorator {
    pub expr: Expr,
    pub span: Span,
}

/// A type annotation as written in the source
#[derive(Debug, Clone)]
pub struct Annotation {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    VarArgs,
    KwArgs,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Annotation>,
    pub default: Option<Expr>,
    /// Span of the whole parameter (`x=1`, `x: int`)
    pub span: Span,
    /// Span of the parameter name alone
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    /// Dotted path inside the module (`Service.load`)
    pub qualname: String,
    pub decorators: Vec<Decorator>,
    pub params: Vec<Param>,
    pub params_span: Span,
    pub returns: Option<Annotation>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_method: bool,
    pub is_generator: bool,
    /// Names this body binds other than by a single-name assignment
    /// statement, including `nonlocal` rebinding from inner functions
    pub indirect_bindings: BTreeSet<String>,
    /// The `def` line itself
    pub span: Span,
    /// First line of the definition including decorators
    pub header: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub qualname: String,
    pub decorators: Vec<Decorator>,
    pub bases: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
    pub header: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Dotted name for `import a.b`, bare name for `from a import b`
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The name this import binds in the importing module
    pub fn bound_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Import {
    /// `from <module> import ...`; `None` for plain `import x`
    pub from_module: Option<String>,
    /// Number of leading dots of a relative import
    pub level: u32,
    pub names: Vec<ImportedName>,
    pub wildcard: bool,
    pub span: Span,
}

impl Import {
    pub fn is_from(&self) -> bool {
        self.from_module.is_some()
    }

    /// Modules this statement pulls in, as written (`..domain.user`, `os.path`)
    pub fn written_modules(&self) -> Vec<String> {
        match &self.from_module {
            Some(module) => vec![format!("{}{}", ".".repeat(self.level as usize), module)],
            None => self.names.iter().map(|n| n.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Return {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Assign {
    /// Simple targets as text (`x`, `self.x`)
    pub targets: Vec<String>,
    pub annotation: Option<Annotation>,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    If,
    For,
    While,
    Try,
    With,
    Match,
}

/// A statement with nested blocks (`if`/`elif`/`else` are one compound)
#[derive(Debug, Clone)]
pub struct Compound {
    pub kind: CompoundKind,
    /// Header expressions: conditions, iterables, context managers
    pub heads: Vec<Expr>,
    pub blocks: Vec<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Str,
    FStr,
    Bytes,
    Int,
    Float,
    Bool(bool),
    None,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Dict,
    Set,
    Tuple,
}

#[derive(Debug, Clone)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal, Span),
    Name(String, Span),
    Attribute {
        value: Box<Expr>,
        attr: String,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
        span: Span,
    },
    Collection(CollectionKind, Vec<Expr>, Span),
    Other(Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Name(_, span)
            | Expr::Attribute { span, .. }
            | Expr::Call { span, .. }
            | Expr::Collection(_, _, span)
            | Expr::Other(span) => *span,
        }
    }

    /// Dotted text of a `Name` / `Attribute` chain (`mock.patch`)
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name(name, _) => Some(name.clone()),
            Expr::Attribute { value, attr, .. } => {
                value.dotted_name().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }

    /// Last segment of the callee for calls, the name itself otherwise
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Expr::Call { func, .. } => func.callee_name(),
            Expr::Name(name, _) => Some(name),
            Expr::Attribute { attr, .. } => Some(attr),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::FunctionDef(f) => f.header,
            Stmt::ClassDef(c) => c.header,
            Stmt::Import(i) => i.span,
            Stmt::Return(r) => r.span,
            Stmt::Assign(a) => a.span,
            Stmt::Expr(e) => e.span(),
            Stmt::Compound(c) => c.span,
            Stmt::Comment(c) => c.span,
            Stmt::Pass(span) | Stmt::Raise(span) | Stmt::Other(span) => *span,
        }
    }

    pub fn is_docstring(&self) -> bool {
        matches!(self, Stmt::Expr(Expr::Literal(Literal::Str, _)))
    }
}

/// Tag used by the traversal driver's dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Module,
    FunctionDef,
    ClassDef,
    Import,
    Return,
    Assign,
    ExprStmt,
    Compound,
    Comment,
    Pass,
    Raise,
    OtherStmt,
    Literal,
    Name,
    Attribute,
    Call,
    Collection,
    OtherExpr,
}

/// A borrowed view of any tree node
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Module(&'a Module),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Module(_) => NodeKind::Module,
            Node::Stmt(stmt) => match stmt {
                Stmt::FunctionDef(_) => NodeKind::FunctionDef,
                Stmt::ClassDef(_) => NodeKind::ClassDef,
                Stmt::Import(_) => NodeKind::Import,
                Stmt::Return(_) => NodeKind::Return,
                Stmt::Assign(_) => NodeKind::Assign,
                Stmt::Expr(_) => NodeKind::ExprStmt,
                Stmt::Compound(_) => NodeKind::Compound,
                Stmt::Comment(_) => NodeKind::Comment,
                Stmt::Pass(_) => NodeKind::Pass,
                Stmt::Raise(_) => NodeKind::Raise,
                Stmt::Other(_) => NodeKind::OtherStmt,
            },
            Node::Expr(expr) => match expr {
                Expr::Literal(..) => NodeKind::Literal,
                Expr::Name(..) => NodeKind::Name,
                Expr::Attribute { .. } => NodeKind::Attribute,
                Expr::Call { .. } => NodeKind::Call,
                Expr::Collection(..) => NodeKind::Collection,
                Expr::Other(_) => NodeKind::OtherExpr,
            },
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Module(_) => Span {
                line: 1,
                ..Span::default()
            },
            Node::Stmt(stmt) => stmt.span(),
            Node::Expr(expr) => expr.span(),
        }
    }

    pub fn as_function(&self) -> Option<&'a FunctionDef> {
        match self {
            Node::Stmt(Stmt::FunctionDef(f)) => Some(f),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&'a ClassDef> {
        match self {
            Node::Stmt(Stmt::ClassDef(c)) => Some(c),
            _ => None,
        }
    }

    pub fn as_import(&self) -> Option<&'a Import> {
        match self {
            Node::Stmt(Stmt::Import(i)) => Some(i),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&'a Expr> {
        match self {
            Node::Expr(e) => Some(e),
            Node::Stmt(Stmt::Expr(e)) => Some(e),
            _ => None,
        }
    }
}

impl FunctionDef {
    /// Statements after an optional docstring, comments dropped
    pub fn effective_body(&self) -> Vec<&Stmt> {
        let mut body: Vec<&Stmt> = self
            .body
            .iter()
            .filter(|s| !matches!(s, Stmt::Comment(_)))
            .collect();
        if body.first().is_some_and(|s| s.is_docstring()) {
            body.remove(0);
        }
        body
    }

    /// A stub body: only `...`, `pass` or a docstring
    pub fn is_stub(&self) -> bool {
        self.effective_body().iter().all(|s| {
            matches!(
                s,
                Stmt::Pass(_) | Stmt::Expr(Expr::Literal(Literal::Ellipsis, _))
            )
        })
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Return statements of this function, not of nested definitions
    pub fn returns(&self) -> Vec<&Return> {
        let mut out = Vec::new();
        collect_returns(&self.body, &mut out);
        out
    }

    pub fn contains_raise(&self) -> bool {
        fn walk(stmts: &[Stmt]) -> bool {
            stmts.iter().any(|s| match s {
                Stmt::Raise(_) => true,
                Stmt::Compound(c) => c.blocks.iter().any(|b| walk(b)),
                _ => false,
            })
        }
        walk(&self.body)
    }

    /// Every assignment to `name` in this function's own body.
    ///
    /// `None` when the name is also bound some other way, so its type cannot
    /// be read off the assignments alone.
    pub fn local_assignments(&self, name: &str) -> Option<Vec<&Assign>> {
        if self.indirect_bindings.contains(name) {
            return None;
        }
        let mut out = Vec::new();
        collect_assignments(&self.body, name, &mut out).then_some(out)
    }
}

/// Push the assignments binding `name`, without entering nested scopes.
/// False when a statement binds it in any other way.
fn collect_assignments<'a>(stmts: &'a [Stmt], name: &str, out: &mut Vec<&'a Assign>) -> bool {
    for stmt in stmts {
        let plain = match stmt {
            Stmt::Assign(a) if a.targets.iter().any(|t| t == name) => {
                out.push(a);
                a.targets.len() == 1
            }
            Stmt::Compound(c) => c.blocks.iter().all(|b| collect_assignments(b, name, out)),
            Stmt::FunctionDef(f) => f.name != name,
            Stmt::ClassDef(c) => c.name != name,
            Stmt::Import(i) => !i.wildcard && i.names.iter().all(|n| n.bound_name() != name),
            _ => true,
        };
        if !plain {
            return false;
        }
    }
    true
}

fn collect_returns<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Return>) {
    for stmt in stmts {
        match stmt {
            Stmt::Return(r) => out.push(r),
            Stmt::Compound(c) => {
                for block in &c.blocks {
                    collect_returns(block, out);
                }
            }
            _ => {}
        }
    }
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.body.iter().rev().find_map(|s| match s {
            Stmt::FunctionDef(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    /// Decorators whose callee ends in `dataclass`
    pub fn dataclass_decorator(&self) -> Option<&Decorator> {
        self.decorators.iter().find(|d| {
            d.expr
                .callee_name()
                .is_some_and(|name| name == "dataclass")
        })
    }
}

impl Module {
    /// Every top-level assignment to `name`, including those inside module
    /// level `if`/`try` blocks. `None` as for [`FunctionDef::local_assignments`].
    pub fn global_assignments(&self, name: &str) -> Option<Vec<&Assign>> {
        if self.indirect_bindings.contains(name) {
            return None;
        }
        let mut out = Vec::new();
        collect_assignments(&self.body, name, &mut out).then_some(out)
    }

    /// Whether `qualname` names more than one definition
    pub fn is_ambiguous(&self, qualname: &str) -> bool {
        self.duplicate_definitions.contains(qualname)
    }

    /// Find a function or method by its qualified name
    pub fn find_function(&self, qualname: &str) -> Option<&FunctionDef> {
        fn walk<'b>(stmts: &'b [Stmt], qualname: &str) -> Option<&'b FunctionDef> {
            for stmt in stmts {
                let found = match stmt {
                    Stmt::FunctionDef(f) if f.qualname == qualname => Some(f),
                    Stmt::FunctionDef(f) => walk(&f.body, qualname),
                    Stmt::ClassDef(c) => walk(&c.body, qualname),
                    Stmt::Compound(c) => c.blocks.iter().find_map(|b| walk(b, qualname)),
                    _ => None,
                };
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        walk(&self.body, qualname)
    }

    pub fn find_class(&self, qualname: &str) -> Option<&ClassDef> {
        fn walk<'b>(stmts: &'b [Stmt], qualname: &str) -> Option<&'b ClassDef> {
            for stmt in stmts {
                let found = match stmt {
                    Stmt::ClassDef(c) if c.qualname == qualname => Some(c),
                    Stmt::ClassDef(c) => walk(&c.body, qualname),
                    Stmt::FunctionDef(f) => walk(&f.body, qualname),
                    Stmt::Compound(c) => c.blocks.iter().find_map(|b| walk(b, qualname)),
                    _ => None,
                };
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        walk(&self.body, qualname)
    }

    /// The class a method belongs to, if any
    pub fn enclosing_class(&self, function: &FunctionDef) -> Option<&ClassDef> {
        if !function.is_method {
            return None;
        }
        let (owner, _) = function.qualname.rsplit_once('.')?;
        self.find_class(owner)
    }

    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.body.iter().filter_map(|s| match s {
            Stmt::Import(i) => Some(i),
            _ => None,
        })
    }

    /// Top-level name bound by a class, function, import or assignment
    pub fn binds(&self, name: &str) -> bool {
        self.body.iter().any(|s| match s {
            Stmt::ClassDef(c) => c.name == name,
            Stmt::FunctionDef(f) => f.name == name,
            Stmt::Import(i) => !i.wildcard && i.names.iter().any(|n| n.bound_name() == name),
            Stmt::Assign(a) => a.targets.iter().any(|t| t == name),
            _ => false,
        })
    }

    /// Position-free, comment-free rendering of the tree.
    ///
    /// Two files whose skeletons are equal differ only in comments and
    /// whitespace.
    pub fn skeleton(&self) -> String {
        let mut out = String::new();
        for stmt in &self.body {
            write_stmt(&mut out, stmt);
        }
        out
    }
}

fn write_block(out: &mut String, stmts: &[Stmt]) {
    out.push('{');
    for stmt in stmts {
        write_stmt(out, stmt);
    }
    out.push('}');
}

fn write_stmt(out: &mut String, stmt: &Stmt) {
    match stmt {
        Stmt::Comment(_) => {}
        Stmt::FunctionDef(f) => {
            let _ = write!(out, "(def {} async={}", f.qualname, f.is_async);
            for d in &f.decorators {
                out.push_str(" @");
                write_expr(out, &d.expr);
            }
            for p in &f.params {
                let _ = write!(out, " [{:?} {}", p.kind, p.name);
                if let Some(a) = &p.annotation {
                    let _ = write!(out, ":{}", a.text);
                }
                if let Some(d) = &p.default {
                    out.push('=');
                    write_expr(out, d);
                }
                out.push(']');
            }
            if let Some(r) = &f.returns {
                let _ = write!(out, " -> {}", r.text);
            }
            write_block(out, &f.body);
            out.push(')');
        }
        Stmt::ClassDef(c) => {
            let _ = write!(out, "(class {}", c.qualname);
            for d in &c.decorators {
                out.push_str(" @");
                write_expr(out, &d.expr);
            }
            for b in &c.bases {
                out.push(' ');
                write_expr(out, b);
            }
            write_block(out, &c.body);
            out.push(')');
        }
        Stmt::Import(i) => {
            let _ = write!(
                out,
                "(import {:?} {} {:?} {})",
                i.from_module, i.level, i.names, i.wildcard
            );
        }
        Stmt::Return(r) => {
            out.push_str("(return");
            if let Some(v) = &r.value {
                out.push(' ');
                write_expr(out, v);
            }
            out.push(')');
        }
        Stmt::Assign(a) => {
            let _ = write!(out, "(assign {:?}", a.targets);
            if let Some(t) = &a.annotation {
                let _ = write!(out, ":{}", t.text);
            }
            if let Some(v) = &a.value {
                out.push(' ');
                write_expr(out, v);
            }
            out.push(')');
        }
        Stmt::Expr(e) => {
            out.push_str("(expr ");
            write_expr(out, e);
            out.push(')');
        }
        Stmt::Compound(c) => {
            let _ = write!(out, "({:?}", c.kind);
            for head in &c.heads {
                out.push(' ');
                write_expr(out, head);
            }
            for block in &c.blocks {
                write_block(out, block);
            }
            out.push(')');
        }
        Stmt::Pass(_) => out.push_str("(pass)"),
        Stmt::Raise(_) => out.push_str("(raise)"),
        Stmt::Other(span) => {
            let _ = write!(out, "(other {})", span.end_byte - span.start_byte);
        }
    }
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal(lit, _) => {
            let _ = write!(out, "{:?}", lit);
        }
        Expr::Name(name, _) => out.push_str(name),
        Expr::Attribute { value, attr, .. } => {
            write_expr(out, value);
            let _ = write!(out, ".{}", attr);
        }
        Expr::Call {
            func,
            args,
            keywords,
            ..
        } => {
            write_expr(out, func);
            out.push('(');
            for a in args {
                write_expr(out, a);
                out.push(',');
            }
            for k in keywords {
                let _ = write!(out, "{}=", k.name);
                write_expr(out, &k.value);
                out.push(',');
            }
            out.push(')');
        }
        Expr::Collection(kind, items, _) => {
            let _ = write!(out, "{:?}[", kind);
            for item in items {
                write_expr(out, item);
                out.push(',');
            }
            out.push(']');
        }
        Expr::Other(_) => out.push('?'),
    }
}
