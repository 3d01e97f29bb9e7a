//! Mutable domain record (ARC003)
//!
//! Records in an immutable layer (`Domain` by default) must be frozen
//! dataclasses. The layer comes from the classifier, including the
//! inheritance walk, so a record deriving from a domain base class is
//! covered even when it lives elsewhere.

use super::base::{Checkable, Fixable, Rule};
use super::context::RuleContext;
use super::REASON_AMBIGUOUS_DEFINITION;
use crate::analyzer::ast::{ClassDef, Literal};
use crate::analyzer::{Expr, Node, NodeKind};
use crate::fixes::TransformationPlan;
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;

pub struct MutableDomainRecordRule;

impl MutableDomainRecordRule {
    pub fn new() -> Self {
        Self
    }

    fn is_frozen(class: &ClassDef) -> bool {
        let Some(decorator) = class.dataclass_decorator() else {
            return false;
        };
        match &decorator.expr {
            Expr::Call { keywords, .. } => keywords.iter().any(|k| {
                k.name == "frozen" && matches!(k.value, Expr::Literal(Literal::Bool(true), _))
            }),
            _ => false,
        }
    }
}

impl Default for MutableDomainRecordRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MutableDomainRecordRule {
    fn code(&self) -> &'static str {
        "ARC003"
    }

    fn name(&self) -> &'static str {
        "mutable-domain-record"
    }

    fn description(&self) -> &'static str {
        "Dataclasses in immutable layers must be frozen"
    }

    fn fix_type(&self) -> FixType {
        FixType::Code
    }

    fn interests(&self) -> &'static [NodeKind] {
        &[NodeKind::ClassDef]
    }

    fn as_checkable(&self) -> Option<&dyn Checkable> {
        Some(self)
    }

    fn as_fixable(&self) -> Option<&dyn Fixable> {
        Some(self)
    }
}

impl Checkable for MutableDomainRecordRule {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let Some(class) = node.as_class() else {
            return Ok(vec![]);
        };
        if class.dataclass_decorator().is_none() || Self::is_frozen(class) {
            return Ok(vec![]);
        }

        let chain = ctx.analyzer.lookup_class_chain(ctx.module, class);
        let Some(layer) = ctx.classifier.resolve(&class.name, ctx.file, &chain) else {
            return Ok(vec![]);
        };
        if !ctx.classifier.is_immutable(&layer) {
            return Ok(vec![]);
        }

        let violation = Violation::new(
            self.code(),
            format!(
                "{} record `{}` is a mutable dataclass",
                layer, class.qualname
            ),
            ctx.location(class.span),
        )
        .with_target(ViolationTarget::symbol(&class.qualname));
        Ok(vec![if ctx.module.is_ambiguous(&class.qualname) {
            violation.unfixable(REASON_AMBIGUOUS_DEFINITION)
        } else {
            violation.fixable()
        }])
    }
}

impl Fixable for MutableDomainRecordRule {
    fn fix(&self, violation: &Violation, ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>> {
        let Some(target) = violation.target() else {
            return Ok(vec![]);
        };
        if ctx.module.is_ambiguous(&target.symbol)
            || ctx.module.find_class(&target.symbol).is_none()
        {
            return Ok(vec![]);
        }
        Ok(vec![TransformationPlan::FreezeRecord {
            class_name: target.symbol.clone(),
        }])
    }

    fn fix_instructions(&self, violation: &Violation) -> String {
        let symbol = violation
            .target()
            .map(|t| t.symbol.as_str())
            .unwrap_or("the record");
        format!(
            "Declare `{}` with `@dataclass(frozen=True)` and replace in-place updates with `dataclasses.replace`.",
            symbol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::Fixture;
    use std::sync::Arc;

    const RECORDS: &str = "from dataclasses import dataclass\n\n@dataclass\nclass Order:\n    id: int\n\n@dataclass(frozen=True)\nclass Money:\n    cents: int\n\n@dataclass(order=True)\nclass Line:\n    qty: int\n\nclass Plain:\n    pass\n";

    #[test]
    fn test_reports_unfrozen_dataclasses_in_domain() {
        let fixture = Fixture::new(&[("app/domain/order.py", RECORDS)]);
        let violations = fixture.check(Arc::new(MutableDomainRecordRule::new()), "app/domain/order.py");
        let targets: Vec<&str> = violations
            .iter()
            .map(|v| v.target().unwrap().symbol.as_str())
            .collect();
        assert_eq!(targets, vec!["Order", "Line"]);
        assert_eq!(
            violations[0].message(),
            "Domain record `Order` is a mutable dataclass"
        );
        assert!(violations.iter().all(|v| v.is_fixable()));
    }

    #[test]
    fn test_other_layers_and_unknown_layers_are_skipped() {
        let fixture = Fixture::new(&[
            ("app/infrastructure/rows.py", RECORDS),
            ("scripts/tool.py", RECORDS),
        ]);
        let rule = Arc::new(MutableDomainRecordRule::new());
        assert!(fixture.check(rule.clone(), "app/infrastructure/rows.py").is_empty());
        assert!(fixture.check(rule, "scripts/tool.py").is_empty());
    }

    #[test]
    fn test_inherited_layer_applies() {
        let fixture = Fixture::new(&[
            ("app/domain/base.py", "class Entity:\n    pass\n"),
            (
                "app/payments/charge.py",
                "from dataclasses import dataclass\nfrom app.domain.base import Entity\n\n@dataclass\nclass Charge(Entity):\n    amount: int\n",
            ),
        ]);
        let plans = fixture.fix(Arc::new(MutableDomainRecordRule::new()), "app/payments/charge.py");
        assert_eq!(
            plans,
            vec![TransformationPlan::FreezeRecord {
                class_name: "Charge".into()
            }]
        );
    }

    #[test]
    fn test_redefined_record_is_unfixable() {
        let source = "from dataclasses import dataclass\nimport sys\n\nif sys.version_info >= (3, 10):\n    @dataclass\n    class Order:\n        id: int\nelse:\n    @dataclass\n    class Order:\n        id: int\n";
        let fixture = Fixture::new(&[("app/domain/order.py", source)]);
        let rule = Arc::new(MutableDomainRecordRule::new());
        let violations = fixture.check(rule.clone(), "app/domain/order.py");
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| !v.is_fixable()));
        assert!(fixture.fix(rule, "app/domain/order.py").is_empty());
    }
}
