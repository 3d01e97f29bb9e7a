//! archfix - architecture-convention linting with gated auto-remediation
//!
//! Analyzes a Python source tree for layering and typing violations and
//! repairs the deterministic subset of them through an ordered, test-validated
//! pipeline of fix passes.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fixes;
pub mod layers;
pub mod models;
pub mod pipeline;
pub mod rules;

pub use analyzer::{PythonAnalyzer, SemanticAnalyzer};
pub use config::{load_project_config, ProjectConfig};
pub use error::{ApplyError, ParseError, PipelineError};
pub use fixes::{DeterministicFixGate, FixApplier, SourceFixApplier, TransformationPlan};
pub use layers::{Layer, LayerClassifier};
pub use models::{Location, RunSummary, Violation};
pub use pipeline::{RemediationPipeline, TestOracle};
pub use rules::{RuleEngine, RuleRegistry};
