//! Base rule traits
//!
//! This module defines the contracts every rule implements:
//! - `Rule`: identity, fix type and the node kinds a rule wants to see
//! - `Checkable`: stateless per-node checks
//! - `Fixable`: turns a violation into transformation plans
//! - `StatefulRule`: checks that need facts gathered across a scope
//!
//! Rules never hold mutable state. Scope-level facts live in a
//! [`ScopeAccumulator`] owned by the traversal driver.

use super::context::RuleContext;
use crate::analyzer::{Node, NodeKind};
use crate::fixes::TransformationPlan;
use crate::models::{FixType, Location, Violation};
use anyhow::Result;
use std::collections::BTreeMap;

/// A registered rule
///
/// Rules are shared read-only across files and worker threads, so every
/// implementation must be `Send + Sync`.
pub trait Rule: Send + Sync {
    /// Stable identifier (`TYP001`)
    fn code(&self) -> &'static str;

    /// Kebab-case name, also accepted as a config key
    fn name(&self) -> &'static str;

    /// Human-readable description of what this rule finds
    fn description(&self) -> &'static str;

    fn fix_type(&self) -> FixType;

    /// Whether this rule adds type hints.
    ///
    /// Hint rules run in the type-hint pass, every other `Code` rule runs
    /// in the architecture pass.
    fn is_type_hint(&self) -> bool {
        false
    }

    /// Node kinds passed to `check` (or to `record` for stateful rules)
    fn interests(&self) -> &'static [NodeKind];

    fn as_checkable(&self) -> Option<&dyn Checkable> {
        None
    }

    fn as_fixable(&self) -> Option<&dyn Fixable> {
        None
    }

    fn as_stateful(&self) -> Option<&dyn StatefulRule> {
        None
    }
}

/// Per-node check. Must be pure: reads the node and the context only.
pub trait Checkable {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>>;
}

/// Produces plans for violations this rule reported
pub trait Fixable {
    /// Plans resolving `violation`, empty when none can be produced
    fn fix(&self, violation: &Violation, ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>>;

    /// What a human should do about `violation`
    fn fix_instructions(&self, violation: &Violation) -> String;
}

/// Facts a stateful rule gathers while the driver is inside one scope
#[derive(Debug, Clone)]
pub struct ScopeAccumulator {
    /// Qualified name of the scope owner
    pub owner: String,
    pub location: Location,
    counters: BTreeMap<&'static str, usize>,
}

impl ScopeAccumulator {
    pub fn new(owner: impl Into<String>, location: Location) -> Self {
        Self {
            owner: owner.into(),
            location,
            counters: BTreeMap::new(),
        }
    }

    /// Increment a counter, returning the new value
    pub fn bump(&mut self, key: &'static str) -> usize {
        let count = self.counters.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, key: &str) -> usize {
        self.counters.get(key).copied().unwrap_or(0)
    }
}

/// A rule that reports on whole scopes.
///
/// The driver calls `open_scope` on nodes of a `scope_kinds` kind, `record`
/// on every node of an `interests` kind while that scope is the innermost
/// one open for this rule, and `leave_scope` once the scope's subtree has
/// been walked.
pub trait StatefulRule {
    fn scope_kinds(&self) -> &'static [NodeKind];

    fn open_scope(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Option<ScopeAccumulator>;

    fn record(
        &self,
        acc: &mut ScopeAccumulator,
        node: &Node<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Vec<Violation>>;

    fn leave_scope(&self, acc: ScopeAccumulator, ctx: &RuleContext<'_>) -> Result<Vec<Violation>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_counters() {
        let mut acc = ScopeAccumulator::new("test_x", Location::new("t.py", 1, 0));
        assert_eq!(acc.count("doubles"), 0);
        assert_eq!(acc.bump("doubles"), 1);
        assert_eq!(acc.bump("doubles"), 2);
        assert_eq!(acc.count("doubles"), 2);
        assert_eq!(acc.count("other"), 0);
    }
}
