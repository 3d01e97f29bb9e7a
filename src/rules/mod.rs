//! Architecture and typing rules
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       RuleEngine                         │
//! │  - Owns the registry and one dispatch table per pass     │
//! │  - Evaluates files in parallel (rayon)                   │
//! │  - Asks fixable rules for plans                          │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Walker                           │
//! │  - Depth-first over the module tree                      │
//! │  - NodeKind-keyed dispatch to check / record hooks       │
//! │  - Owns stateful accumulators, captures rule faults      │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!       ┌────────────┐  ┌────────────┐  ┌──────────────┐
//!       │ Checkable  │  │  Fixable   │  │ StatefulRule │
//!       └────────────┘  └────────────┘  └──────────────┘
//! ```
//!
//! # Catalogue
//!
//! - `TYP001` missing-return-annotation
//! - `TYP002` missing-parameter-annotation
//! - `ARC002` opaque-indirection
//! - `ARC003` mutable-domain-record
//! - `ARC001` layer-dependency (comment only)
//! - `TST001` excessive-test-doubles (comment only, stateful)

mod base;
mod context;
mod engine;
mod walker;

mod excessive_test_doubles;
mod layer_dependency;
mod missing_parameter_annotation;
mod missing_return_annotation;
mod mutable_domain_record;
mod opaque_indirection;

#[cfg(test)]
pub(crate) mod testing;

pub use base::{Checkable, Fixable, Rule, ScopeAccumulator, StatefulRule};
pub use context::RuleContext;
pub use engine::{FileEvaluation, RuleEngine, RuleEngineBuilder, RuleRegistry, RuleSelection};
pub use walker::{DispatchTable, WalkOutcome, Walker};

pub use excessive_test_doubles::ExcessiveTestDoublesRule;
pub use layer_dependency::LayerDependencyRule;
pub use missing_parameter_annotation::MissingParameterAnnotationRule;
pub use missing_return_annotation::MissingReturnAnnotationRule;
pub use mutable_domain_record::MutableDomainRecordRule;
pub use opaque_indirection::OpaqueIndirectionRule;

use crate::config::ProjectConfig;
use std::sync::Arc;

/// A fix addresses its target by qualified name, which must be unique
pub const REASON_AMBIGUOUS_DEFINITION: &str = "another definition shares this name";

/// The built-in catalogue, in registration order
pub fn default_rules(config: &ProjectConfig) -> Vec<Arc<dyn Rule>> {
    vec![
        // Type hints
        Arc::new(MissingReturnAnnotationRule::new()),
        Arc::new(MissingParameterAnnotationRule::new()),
        // Architecture
        Arc::new(OpaqueIndirectionRule::new()),
        Arc::new(MutableDomainRecordRule::new()),
        // Governance
        Arc::new(LayerDependencyRule::new()),
        Arc::new(ExcessiveTestDoublesRule::with_config(config)),
    ]
}
