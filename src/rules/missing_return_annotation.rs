//! Missing return annotation (TYP001)
//!
//! Reports functions without a `->` annotation. The return type is inferred
//! from the function body and passed through the fix gate, so only concrete
//! types are ever written back.

use super::base::{Checkable, Fixable, Rule};
use super::context::RuleContext;
use super::REASON_AMBIGUOUS_DEFINITION;
use crate::analyzer::{FunctionDef, Node, NodeKind};
use crate::fixes::TransformationPlan;
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;

pub struct MissingReturnAnnotationRule;

impl MissingReturnAnnotationRule {
    pub fn new() -> Self {
        Self
    }

    fn lookup<'a>(violation: &Violation, ctx: &RuleContext<'a>) -> Option<&'a FunctionDef> {
        let target = violation.target()?;
        ctx.module.find_function(&target.symbol)
    }
}

impl Default for MissingReturnAnnotationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MissingReturnAnnotationRule {
    fn code(&self) -> &'static str {
        "TYP001"
    }

    fn name(&self) -> &'static str {
        "missing-return-annotation"
    }

    fn description(&self) -> &'static str {
        "Functions must declare their return type"
    }

    fn fix_type(&self) -> FixType {
        FixType::Code
    }

    fn is_type_hint(&self) -> bool {
        true
    }

    fn interests(&self) -> &'static [NodeKind] {
        &[NodeKind::FunctionDef]
    }

    fn as_checkable(&self) -> Option<&dyn Checkable> {
        Some(self)
    }

    fn as_fixable(&self) -> Option<&dyn Fixable> {
        Some(self)
    }
}

impl Checkable for MissingReturnAnnotationRule {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let Some(function) = node.as_function() else {
            return Ok(vec![]);
        };
        if function.returns.is_some() {
            return Ok(vec![]);
        }

        let violation = Violation::new(
            self.code(),
            format!("function `{}` has no return annotation", function.qualname),
            ctx.location(function.span),
        )
        .with_target(ViolationTarget::symbol(&function.qualname));
        if ctx.module.is_ambiguous(&function.qualname) {
            return Ok(vec![violation.unfixable(REASON_AMBIGUOUS_DEFINITION)]);
        }

        let inferred = ctx.analyzer.infer_return_type(ctx.module, function);
        let decision = ctx.gate.can_fix(&inferred);
        let violation = if decision.fixable {
            violation.fixable()
        } else {
            violation.unfixable(decision.reason.unwrap_or_default())
        };
        Ok(vec![violation])
    }
}

impl Fixable for MissingReturnAnnotationRule {
    fn fix(&self, violation: &Violation, ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>> {
        let Some(function) = Self::lookup(violation, ctx) else {
            return Ok(vec![]);
        };
        if ctx.module.is_ambiguous(&function.qualname) {
            return Ok(vec![]);
        }
        let inferred = ctx.analyzer.infer_return_type(ctx.module, function);
        let Ok(approved) = ctx.gate.approve(&inferred) else {
            return Ok(vec![]);
        };

        let mut plans = Vec::new();
        if let Some(import) = ctx.gate.import_requirement(ctx.analyzer, ctx.module, &approved) {
            plans.push(import);
        }
        plans.push(TransformationPlan::AddReturnType {
            function: function.qualname.clone(),
            type_name: approved,
        });
        Ok(plans)
    }

    fn fix_instructions(&self, violation: &Violation) -> String {
        let symbol = violation
            .target()
            .map(|t| t.symbol.as_str())
            .unwrap_or("the function");
        match violation.fix_failure_reason() {
            Some(reason) => format!(
                "Add an explicit `-> <type>` annotation to `{}` ({}).",
                symbol, reason
            ),
            None => format!(
                "Add the inferred return annotation to `{}`; `archfix fix` can do this.",
                symbol
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{check_source, fix_source};

    #[test]
    fn test_reports_unannotated_functions_only() {
        let violations = check_source(
            MissingReturnAnnotationRule::new(),
            "def a() -> int:\n    return 1\n\ndef b():\n    return 1\n",
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message(), "function `b` has no return annotation");
        assert_eq!(violations[0].location().line, 4);
        assert!(violations[0].is_fixable());
    }

    #[test]
    fn test_dynamic_and_unknown_are_unfixable() {
        let violations = check_source(
            MissingReturnAnnotationRule::new(),
            "from typing import Any\n\ndef a(x: Any):\n    return x\n\ndef b(x):\n    return x\n",
        );
        let reasons: Vec<Option<&str>> =
            violations.iter().map(|v| v.fix_failure_reason()).collect();
        assert_eq!(
            reasons,
            vec![
                Some("would require banned dynamic type"),
                Some("inference failed")
            ]
        );
    }

    #[test]
    fn test_reassigned_result_is_not_annotated() {
        let source = "def first_truthy(items: list):\n    result = None\n    for item in items:\n        if item:\n            result = \"found\"\n            break\n    return result\n\n\
def label(n: int):\n    text = 0\n    text = \"n=\" + str(n)\n    return text\n";

        let violations = check_source(MissingReturnAnnotationRule::new(), source);
        assert_eq!(violations.len(), 2);
        for violation in &violations {
            assert!(!violation.is_fixable());
            assert_eq!(violation.fix_failure_reason(), Some("inference failed"));
        }
        assert!(fix_source(MissingReturnAnnotationRule::new(), &[], source).is_empty());
    }

    #[test]
    fn test_duplicate_definitions_are_left_to_a_human() {
        let source = "class A:\n    @property\n    def name(self) -> str:\n        return self._name\n\n    @name.setter\n    def name(self, value: str):\n        self._name = value\n";
        let violations = check_source(MissingReturnAnnotationRule::new(), source);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].target().unwrap().symbol, "A.name");
        assert_eq!(
            violations[0].fix_failure_reason(),
            Some(crate::rules::REASON_AMBIGUOUS_DEFINITION)
        );
        assert!(fix_source(MissingReturnAnnotationRule::new(), &[], source).is_empty());
    }

    #[test]
    fn test_fix_adds_import_for_foreign_class() {
        let plans = fix_source(
            MissingReturnAnnotationRule::new(),
            &[("models.py", "class User:\n    pass\n")],
            "from models import User as U\n\ndef make():\n    return U()\n",
        );
        // `User` is only bound under an alias, so the bare name needs an import
        assert_eq!(plans.len(), 2);
        assert_eq!(
            plans[0],
            TransformationPlan::AddImport {
                module: "models".into(),
                name: "User".into()
            }
        );
        assert!(matches!(
            &plans[1],
            TransformationPlan::AddReturnType { function, type_name }
                if function == "make" && type_name.annotation() == "User"
        ));
    }

    #[test]
    fn test_methods_use_qualified_names() {
        let plans = fix_source(
            MissingReturnAnnotationRule::new(),
            &[],
            "class Service:\n    def ready(self):\n        return True\n",
        );
        assert!(matches!(
            &plans[..],
            [TransformationPlan::AddReturnType { function, type_name }]
                if function == "Service.ready" && type_name.annotation() == "bool"
        ));
    }
}
