//! Semantic analysis for Python sources
//!
//! [`SemanticAnalyzer`] is the seam the rules and the pipeline talk to.
//! [`PythonAnalyzer`] implements it with tree-sitter parsing and a
//! process-wide inference cache that the pipeline clears between passes.

pub mod ast;
mod infer;
pub mod python;

pub use ast::{Expr, FunctionDef, Module, Node, NodeKind, Stmt};
pub use infer::PythonAnalyzer;

use crate::error::ParseError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A concrete, named type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Name as it should be written in an annotation (`str`, `User`, `list[int]`)
    pub name: String,
    /// Defining module for importable types, `None` for builtins
    pub module: Option<String>,
}

impl TypeRef {
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
        }
    }

    pub fn defined_in(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: Some(module.into()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.module.is_none()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}.{}", module, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Result of a type-inference query. Inference never fails; `Unknown` is a
/// valid answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InferredType {
    Known(TypeRef),
    /// The banned untyped marker (`Any`)
    Dynamic,
    Unknown,
}

impl InferredType {
    pub fn builtin(name: &str) -> Self {
        InferredType::Known(TypeRef::builtin(name))
    }

    pub fn is_known(&self) -> bool {
        matches!(self, InferredType::Known(_))
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Known(t) => write!(f, "{}", t),
            InferredType::Dynamic => write!(f, "Any"),
            InferredType::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Where an expression appears, for name resolution
#[derive(Debug, Clone, Copy)]
pub struct InferenceScope<'a> {
    pub module: &'a Module,
    pub class: Option<&'a ast::ClassDef>,
    pub function: Option<&'a FunctionDef>,
}

impl<'a> InferenceScope<'a> {
    pub fn module(module: &'a Module) -> Self {
        Self {
            module,
            class: None,
            function: None,
        }
    }

    pub fn function(module: &'a Module, function: &'a FunctionDef) -> Self {
        Self {
            module,
            class: module.enclosing_class(function),
            function: Some(function),
        }
    }
}

/// One base class in an inheritance chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub name: String,
    /// File defining the ancestor, relative to the analyzer root, when resolvable
    pub path: Option<PathBuf>,
}

/// Parsing and type-inference service shared by every rule
pub trait SemanticAnalyzer: Send + Sync {
    /// Project root that module names are resolved against
    fn root(&self) -> &Path;

    /// Parse a file. Fails with [`ParseError`] on invalid syntax.
    fn parse(&self, path: &Path) -> Result<Arc<Module>, ParseError>;

    /// Type of an expression evaluated in `scope`
    fn infer_type(&self, scope: &InferenceScope<'_>, expr: &Expr) -> InferredType;

    /// Type a function returns, inferred from its body
    fn infer_return_type(&self, module: &Module, function: &FunctionDef) -> InferredType;

    /// Resolve an annotation as written in `module`
    fn resolve_annotation(&self, module: &Module, annotation: &str) -> InferredType;

    /// Base classes of `class`, nearest first
    fn lookup_class_chain(&self, module: &Module, class: &ast::ClassDef) -> Vec<Ancestor>;

    /// Absolute dotted modules an import statement refers to, in the order
    /// of [`ast::Import::written_modules`]
    fn imported_modules(&self, module: &Module, import: &ast::Import) -> Vec<String>;

    /// Whether `type_ref` can be used unqualified in `module`
    fn is_reachable(&self, module: &Module, type_ref: &TypeRef) -> bool;

    /// Drop every cached parse and inference result. Idempotent.
    fn clear_cache(&self);
}
