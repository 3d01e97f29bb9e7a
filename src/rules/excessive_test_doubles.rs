//! Excessive test doubles (TST001)
//!
//! Counts mocks created inside each pytest-style `test*` function,
//! including `@patch` decorators and `with patch(...)` blocks. A test that
//! needs more than `max_doubles` of them is usually testing wiring rather
//! than behavior.

use super::base::{Fixable, Rule, ScopeAccumulator, StatefulRule};
use super::context::RuleContext;
use crate::analyzer::{Expr, Node, NodeKind};
use crate::config::ProjectConfig;
use crate::fixes::{CommentAnchor, TransformationPlan};
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;

const DEFAULT_MAX_DOUBLES: usize = 3;
const DOUBLES_KEY: &str = "doubles";

/// Callee names that create a test double
const DOUBLE_FACTORIES: &[&str] = &[
    "Mock",
    "MagicMock",
    "AsyncMock",
    "NonCallableMock",
    "PropertyMock",
    "create_autospec",
    "patch",
];

pub struct ExcessiveTestDoublesRule {
    max_doubles: usize,
}

impl ExcessiveTestDoublesRule {
    pub fn new() -> Self {
        Self {
            max_doubles: DEFAULT_MAX_DOUBLES,
        }
    }

    /// Reads `max_doubles` from the rule's thresholds
    pub fn with_config(config: &ProjectConfig) -> Self {
        let rule = Self::new();
        let max_doubles = config
            .threshold_i64(rule.code(), rule.name(), "max_doubles")
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_MAX_DOUBLES);
        Self { max_doubles }
    }

    /// `Mock()`, `mock.MagicMock()`, `patch(...)`, `patch.object(...)`,
    /// `mocker.patch.dict(...)`
    fn creates_double(expr: &Expr) -> bool {
        let Expr::Call { func, .. } = expr else {
            return false;
        };
        let Some(dotted) = func.dotted_name() else {
            return false;
        };
        let mut segments = dotted.rsplit('.');
        let last = segments.next().unwrap_or_default();
        DOUBLE_FACTORIES.contains(&last) || segments.any(|s| s == "patch")
    }
}

impl Default for ExcessiveTestDoublesRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ExcessiveTestDoublesRule {
    fn code(&self) -> &'static str {
        "TST001"
    }

    fn name(&self) -> &'static str {
        "excessive-test-doubles"
    }

    fn description(&self) -> &'static str {
        "Tests should not need many mocks"
    }

    fn fix_type(&self) -> FixType {
        FixType::CommentOnly
    }

    fn interests(&self) -> &'static [NodeKind] {
        &[NodeKind::Call]
    }

    fn as_fixable(&self) -> Option<&dyn Fixable> {
        Some(self)
    }

    fn as_stateful(&self) -> Option<&dyn StatefulRule> {
        Some(self)
    }
}

impl StatefulRule for ExcessiveTestDoublesRule {
    fn scope_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef]
    }

    fn open_scope(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Option<ScopeAccumulator> {
        let function = node.as_function()?;
        if !function.name.starts_with("test") {
            return None;
        }
        Some(ScopeAccumulator::new(
            function.qualname.clone(),
            ctx.location(function.span),
        ))
    }

    fn record(
        &self,
        acc: &mut ScopeAccumulator,
        node: &Node<'_>,
        _ctx: &RuleContext<'_>,
    ) -> Result<Vec<Violation>> {
        if node.as_expr().is_some_and(Self::creates_double) {
            acc.bump(DOUBLES_KEY);
        }
        Ok(vec![])
    }

    fn leave_scope(&self, acc: ScopeAccumulator, _ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let count = acc.count(DOUBLES_KEY);
        if count <= self.max_doubles {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            self.code(),
            format!(
                "`{}` uses {} test doubles (max {})",
                acc.owner, count, self.max_doubles
            ),
            acc.location,
        )
        .with_target(ViolationTarget::symbol(acc.owner))
        .comment_only()
        .fixable()])
    }
}

impl Fixable for ExcessiveTestDoublesRule {
    fn fix(&self, violation: &Violation, _ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>> {
        let Some(target) = violation.target() else {
            return Ok(vec![]);
        };
        Ok(vec![TransformationPlan::InjectComment {
            anchor: CommentAnchor::Symbol(target.symbol.clone()),
            text: format!("{} {}", self.code(), violation.message()),
        }])
    }

    fn fix_instructions(&self, violation: &Violation) -> String {
        format!(
            "{}. Prefer fakes or real collaborators and test behavior at a seam.",
            violation.message()
        )
    }
}
