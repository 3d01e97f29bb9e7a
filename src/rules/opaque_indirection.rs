//! Opaque indirection (ARC002)
//!
//! A function whose whole body is `return some_call(...)` adds a hop without
//! adding information. It is only reported while the callee's declared
//! return type is unresolved: once the callee is annotated, the wrapper's
//! type is evident and the indirection is harmless.
//!
//! Fixing this requires a human decision (inline the call, or type the
//! callee), so the rule never proposes a plan.

use super::base::{Checkable, Rule};
use super::context::RuleContext;
use crate::analyzer::{Expr, InferenceScope, InferredType, Node, NodeKind, Stmt};
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;

pub const REASON_NEEDS_DECISION: &str = "callee return type unresolved; needs a human decision";

pub struct OpaqueIndirectionRule;

impl OpaqueIndirectionRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpaqueIndirectionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for OpaqueIndirectionRule {
    fn code(&self) -> &'static str {
        "ARC002"
    }

    fn name(&self) -> &'static str {
        "opaque-indirection"
    }

    fn description(&self) -> &'static str {
        "Type the forwarded call or inline the wrapper"
    }

    fn fix_type(&self) -> FixType {
        FixType::Code
    }

    fn interests(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef]
    }

    fn as_checkable(&self) -> Option<&dyn Checkable> {
        Some(self)
    }
}

impl Checkable for OpaqueIndirectionRule {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let Some(function) = node.as_function() else {
            return Ok(vec![]);
        };
        let body = function.effective_body();
        let [Stmt::Return(ret)] = body.as_slice() else {
            return Ok(vec![]);
        };
        let Some(call) = &ret.value else {
            return Ok(vec![]);
        };
        let Expr::Call { func, .. } = call else {
            return Ok(vec![]);
        };

        let scope = InferenceScope::function(ctx.module, function);
        if ctx.analyzer.infer_type(&scope, call) != InferredType::Unknown {
            return Ok(vec![]);
        }

        let callee = func.dotted_name().unwrap_or_else(|| "<expression>".to_string());
        Ok(vec![Violation::new(
            self.code(),
            format!(
                "`{}` only forwards to `{}()`, whose return type cannot be resolved",
                function.qualname, callee
            ),
            ctx.location(function.span),
        )
        .with_target(ViolationTarget::symbol(&function.qualname))
        .unfixable(REASON_NEEDS_DECISION)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::check_source;

    #[test]
    fn test_reports_forwarding_to_untyped_callee() {
        let violations = check_source(
            OpaqueIndirectionRule::new(),
            "def greeting():\n    return \"hello\"\n\ndef relay():\n    return greeting()\n",
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].message(),
            "`relay` only forwards to `greeting()`, whose return type cannot be resolved"
        );
        assert!(!violations[0].is_fixable());
        assert_eq!(
            violations[0].fix_failure_reason(),
            Some(REASON_NEEDS_DECISION)
        );
    }

    #[test]
    fn test_typed_callee_is_fine() {
        let violations = check_source(
            OpaqueIndirectionRule::new(),
            "def greeting() -> str:\n    return \"hello\"\n\ndef relay():\n    return greeting()\n",
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_docstring_is_ignored_but_other_statements_are_not() {
        let violations = check_source(
            OpaqueIndirectionRule::new(),
            "def a():\n    \"\"\"Doc.\"\"\"\n    return fetch()\n\ndef b():\n    log()\n    return fetch()\n",
        );
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message().starts_with("`a`"));
    }

    #[test]
    fn test_constructor_calls_are_resolved() {
        let violations = check_source(
            OpaqueIndirectionRule::new(),
            "class User:\n    pass\n\ndef make():\n    return User()\n\ndef items():\n    return list()\n",
        );
        assert!(violations.is_empty());
    }
}
