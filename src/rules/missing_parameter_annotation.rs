//! Missing parameter annotation (TYP002)
//!
//! Reports positional parameters without an annotation. A type is only
//! proposed when the default value pins it down; `self`, `cls` and splat
//! parameters are never reported.

use super::base::{Checkable, Fixable, Rule};
use super::context::RuleContext;
use super::REASON_AMBIGUOUS_DEFINITION;
use crate::analyzer::ast::{Literal, Param, ParamKind};
use crate::analyzer::{Expr, FunctionDef, InferenceScope, InferredType, Node, NodeKind};
use crate::fixes::TransformationPlan;
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;

pub struct MissingParameterAnnotationRule;

impl MissingParameterAnnotationRule {
    pub fn new() -> Self {
        Self
    }

    fn is_receiver(function: &FunctionDef, index: usize, param: &Param) -> bool {
        function.is_method && index == 0 && matches!(param.name.as_str(), "self" | "cls")
    }

    /// Defaults are evaluated where the `def` runs, so module scope is the
    /// right place to resolve names in them. A `None` default says nothing
    /// about the intended type.
    fn default_type(ctx: &RuleContext<'_>, param: &Param) -> InferredType {
        match &param.default {
            None | Some(Expr::Literal(Literal::None, _)) => InferredType::Unknown,
            Some(default) => ctx
                .analyzer
                .infer_type(&InferenceScope::module(ctx.module), default),
        }
    }
}

impl Default for MissingParameterAnnotationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MissingParameterAnnotationRule {
    fn code(&self) -> &'static str {
        "TYP002"
    }

    fn name(&self) -> &'static str {
        "missing-parameter-annotation"
    }

    fn description(&self) -> &'static str {
        "Function parameters must declare their type"
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

impl Checkable for MissingParameterAnnotationRule {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let Some(function) = node.as_function() else {
            return Ok(vec![]);
        };

        let ambiguous = ctx.module.is_ambiguous(&function.qualname);
        let mut violations = Vec::new();
        for (index, param) in function.params.iter().enumerate() {
            if param.kind != ParamKind::Positional
                || param.annotation.is_some()
                || Self::is_receiver(function, index, param)
            {
                continue;
            }

            let violation = Violation::new(
                self.code(),
                format!(
                    "parameter `{}` of `{}` has no type annotation",
                    param.name, function.qualname
                ),
                ctx.location(param.name_span),
            )
            .with_target(ViolationTarget::member(&function.qualname, &param.name));
            if ambiguous {
                violations.push(violation.unfixable(REASON_AMBIGUOUS_DEFINITION));
                continue;
            }

            let decision = ctx.gate.can_fix(&Self::default_type(ctx, param));
            violations.push(if decision.fixable {
                violation.fixable()
            } else {
                violation.unfixable(decision.reason.unwrap_or_default())
            });
        }
        Ok(violations)
    }
}

impl Fixable for MissingParameterAnnotationRule {
    fn fix(&self, violation: &Violation, ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>> {
        let Some(target) = violation.target() else {
            return Ok(vec![]);
        };
        let Some(parameter) = target.member.as_deref() else {
            return Ok(vec![]);
        };
        if ctx.module.is_ambiguous(&target.symbol) {
            return Ok(vec![]);
        }
        let Some(param) = ctx
            .module
            .find_function(&target.symbol)
            .and_then(|f| f.param(parameter))
        else {
            return Ok(vec![]);
        };
        let Ok(approved) = ctx.gate.approve(&Self::default_type(ctx, param)) else {
            return Ok(vec![]);
        };

        let mut plans = Vec::new();
        if let Some(import) = ctx.gate.import_requirement(ctx.analyzer, ctx.module, &approved) {
            plans.push(import);
        }
        plans.push(TransformationPlan::AddParameterType {
            function: target.symbol.clone(),
            parameter: parameter.to_string(),
            type_name: approved,
        });
        Ok(plans)
    }

    fn fix_instructions(&self, violation: &Violation) -> String {
        let (symbol, parameter) = violation
            .target()
            .map(|t| (t.symbol.as_str(), t.member.as_deref().unwrap_or("?")))
            .unwrap_or(("the function", "?"));
        match violation.fix_failure_reason() {
            Some(reason) => format!(
                "Annotate parameter `{}` of `{}` by hand ({}).",
                parameter, symbol, reason
            ),
            None => format!(
                "Annotate parameter `{}` of `{}` with the type of its default.",
                parameter, symbol
            ),
        }
    }
}
