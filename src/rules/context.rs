//! Read-only context handed to every rule hook

use crate::analyzer::ast::{ClassDef, Span};
use crate::analyzer::{FunctionDef, InferenceScope, Module, SemanticAnalyzer};
use crate::config::ProjectConfig;
use crate::fixes::DeterministicFixGate;
use crate::layers::LayerClassifier;
use crate::models::Location;
use std::path::Path;

#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// File being evaluated, relative to the project root
    pub file: &'a Path,
    pub module: &'a Module,
    pub analyzer: &'a dyn SemanticAnalyzer,
    pub classifier: &'a LayerClassifier,
    pub config: &'a ProjectConfig,
    pub gate: &'a DeterministicFixGate,
    /// Innermost class around the current node
    pub class: Option<&'a ClassDef>,
    /// Innermost function around the current node
    pub function: Option<&'a FunctionDef>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        module: &'a Module,
        analyzer: &'a dyn SemanticAnalyzer,
        classifier: &'a LayerClassifier,
        config: &'a ProjectConfig,
        gate: &'a DeterministicFixGate,
    ) -> Self {
        Self {
            file: &module.path,
            module,
            analyzer,
            classifier,
            config,
            gate,
            class: None,
            function: None,
        }
    }

    pub fn enter_class(self, class: &'a ClassDef) -> Self {
        Self {
            class: Some(class),
            function: None,
            ..self
        }
    }

    pub fn enter_function(self, function: &'a FunctionDef) -> Self {
        Self {
            function: Some(function),
            ..self
        }
    }

    pub fn location(&self, span: Span) -> Location {
        Location::new(self.file, span.line, span.column)
    }

    /// Scope for inferring expressions at the current position
    pub fn inference_scope(&self) -> InferenceScope<'a> {
        InferenceScope {
            module: self.module,
            class: self.class,
            function: self.function,
        }
    }
}
