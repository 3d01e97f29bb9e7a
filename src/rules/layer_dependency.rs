//! Layer dependency (ARC001)
//!
//! Dependencies must point inward: a module may import from its own layer
//! or from layers earlier in `[layers].order`, never from later ones. The
//! fix explains the breach next to the import; moving code across layers is
//! left to a human.

use super::base::{Checkable, Fixable, Rule};
use super::context::RuleContext;
use crate::analyzer::{Node, NodeKind};
use crate::fixes::{CommentAnchor, TransformationPlan};
use crate::models::{FixType, Violation, ViolationTarget};
use anyhow::Result;
use std::collections::BTreeSet;

pub struct LayerDependencyRule;

impl LayerDependencyRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LayerDependencyRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for LayerDependencyRule {
    fn code(&self) -> &'static str {
        "ARC001"
    }

    fn name(&self) -> &'static str {
        "layer-dependency"
    }

    fn description(&self) -> &'static str {
        "Inner layers must not import outer layers"
    }

    fn fix_type(&self) -> FixType {
        FixType::CommentOnly
    }

    fn interests(&self) -> &'static [NodeKind] {
        &[NodeKind::Import]
    }

    fn as_checkable(&self) -> Option<&dyn Checkable> {
        Some(self)
    }

    fn as_fixable(&self) -> Option<&dyn Fixable> {
        Some(self)
    }
}

impl Checkable for LayerDependencyRule {
    fn check(&self, node: &Node<'_>, ctx: &RuleContext<'_>) -> Result<Vec<Violation>> {
        let Some(import) = node.as_import() else {
            return Ok(vec![]);
        };
        let Some(importer) = ctx.classifier.classify_path(ctx.file) else {
            return Ok(vec![]);
        };
        let Some(importer_rank) = ctx.classifier.rank(&importer) else {
            return Ok(vec![]);
        };

        let written = import.written_modules();
        let resolved = ctx.analyzer.imported_modules(ctx.module, import);
        let mut seen = BTreeSet::new();
        let mut violations = Vec::new();
        for (as_written, absolute) in written.iter().zip(resolved.iter()) {
            let Some(imported) = ctx.classifier.classify_module(absolute) else {
                continue;
            };
            let Some(imported_rank) = ctx.classifier.rank(&imported) else {
                continue;
            };
            if imported_rank <= importer_rank || !seen.insert(as_written.clone()) {
                continue;
            }
            violations.push(
                Violation::new(
                    self.code(),
                    format!(
                        "{} layer imports {} module `{}`",
                        importer, imported, absolute
                    ),
                    ctx.location(import.span),
                )
                .with_target(ViolationTarget::symbol(as_written))
                .comment_only()
                .fixable(),
            );
        }
        Ok(violations)
    }
}

impl Fixable for LayerDependencyRule {
    fn fix(&self, violation: &Violation, _ctx: &RuleContext<'_>) -> Result<Vec<TransformationPlan>> {
        let Some(target) = violation.target() else {
            return Ok(vec![]);
        };
        Ok(vec![TransformationPlan::InjectComment {
            anchor: CommentAnchor::Import(target.symbol.clone()),
            text: format!("{} {}", self.code(), violation.message()),
        }])
    }

    fn fix_instructions(&self, violation: &Violation) -> String {
        format!(
            "{}. Depend on an abstraction owned by the inner layer and implement it in the outer one.",
            violation.message()
        )
    }
}
