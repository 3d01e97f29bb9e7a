//! Traversal driver
//!
//! Walks one module depth-first and dispatches each node to the rules that
//! registered interest in its kind. The dispatch table is built once per
//! engine; the walker owns the accumulator stacks of stateful rules.

use super::base::{Rule, ScopeAccumulator};
use super::context::RuleContext;
use crate::analyzer::{Expr, Node, NodeKind, Stmt};
use crate::models::{RuleFailure, Violation};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Rule indices keyed by the node kinds they handle
#[derive(Debug, Default)]
pub struct DispatchTable {
    checks: BTreeMap<NodeKind, Vec<usize>>,
    scopes: BTreeMap<NodeKind, Vec<usize>>,
    records: BTreeMap<NodeKind, Vec<usize>>,
}

impl DispatchTable {
    pub fn build(rules: &[Arc<dyn Rule>]) -> Self {
        let mut table = Self::default();
        for (idx, rule) in rules.iter().enumerate() {
            if let Some(stateful) = rule.as_stateful() {
                for kind in stateful.scope_kinds() {
                    table.scopes.entry(*kind).or_default().push(idx);
                }
                for kind in rule.interests() {
                    table.records.entry(*kind).or_default().push(idx);
                }
            } else if rule.as_checkable().is_some() {
                for kind in rule.interests() {
                    table.checks.entry(*kind).or_default().push(idx);
                }
            }
        }
        table
    }

    fn checks(&self, kind: NodeKind) -> &[usize] {
        self.checks.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn scopes(&self, kind: NodeKind) -> &[usize] {
        self.scopes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn records(&self, kind: NodeKind) -> &[usize] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Run a rule hook, turning errors and panics into a [`RuleFailure`]
pub(crate) fn guarded<T>(
    code: &str,
    file: &Path,
    hook: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, RuleFailure> {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook));
    let message = match outcome {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => {
            error!("Rule {} failed on {}: {:#}", code, file.display(), e);
            format!("{:#}", e)
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Rule {} panicked on {}: {}", code, file.display(), panic_msg);
            format!("panicked: {}", panic_msg)
        }
    };
    Err(RuleFailure {
        code: code.to_string(),
        file: file.to_path_buf(),
        message,
    })
}

/// Output of walking one module
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub violations: Vec<Violation>,
    pub failures: Vec<RuleFailure>,
}

pub struct Walker<'r> {
    rules: &'r [Arc<dyn Rule>],
    table: &'r DispatchTable,
    stacks: Vec<Vec<ScopeAccumulator>>,
    /// A rule that failed once is skipped for the rest of the file
    failed: Vec<bool>,
    outcome: WalkOutcome,
}

impl<'r> Walker<'r> {
    pub fn new(rules: &'r [Arc<dyn Rule>], table: &'r DispatchTable) -> Self {
        Self {
            rules,
            table,
            stacks: vec![Vec::new(); rules.len()],
            failed: vec![false; rules.len()],
            outcome: WalkOutcome::default(),
        }
    }

    pub fn run(mut self, ctx: RuleContext<'_>) -> WalkOutcome {
        self.visit(Node::Module(ctx.module), ctx);
        self.outcome
    }

    fn visit<'a>(&mut self, node: Node<'a>, ctx: RuleContext<'a>) {
        let kind = node.kind();
        let rules = self.rules;
        let table = self.table;

        for &idx in table.checks(kind) {
            let rule = &rules[idx];
            if self.failed[idx] {
                continue;
            }
            let Some(checkable) = rule.as_checkable() else {
                continue;
            };
            let result = guarded(rule.code(), ctx.file, || checkable.check(&node, &ctx));
            self.collect(idx, result);
        }

        for &idx in table.records(kind) {
            let rule = &rules[idx];
            if self.failed[idx] {
                continue;
            }
            let (Some(stateful), Some(acc)) = (rule.as_stateful(), self.stacks[idx].last_mut())
            else {
                continue;
            };
            let result = guarded(rule.code(), ctx.file, || stateful.record(acc, &node, &ctx));
            self.collect(idx, result);
        }

        let mut opened = Vec::new();
        for &idx in table.scopes(kind) {
            let rule = &rules[idx];
            if self.failed[idx] {
                continue;
            }
            let Some(stateful) = rule.as_stateful() else {
                continue;
            };
            let result = guarded(rule.code(), ctx.file, || {
                Ok(stateful.open_scope(&node, &ctx))
            });
            match result {
                Ok(Some(acc)) => {
                    self.stacks[idx].push(acc);
                    opened.push(idx);
                }
                Ok(None) => {}
                Err(failure) => self.fail(idx, failure),
            }
        }

        self.visit_children(node, ctx);

        for idx in opened.into_iter().rev() {
            let Some(acc) = self.stacks[idx].pop() else {
                continue;
            };
            if self.failed[idx] {
                continue;
            }
            let rule = &rules[idx];
            let Some(stateful) = rule.as_stateful() else {
                continue;
            };
            let result = guarded(rule.code(), ctx.file, || stateful.leave_scope(acc, &ctx));
            self.collect(idx, result);
        }
    }

    fn visit_children<'a>(&mut self, node: Node<'a>, ctx: RuleContext<'a>) {
        match node {
            Node::Module(module) => self.visit_block(&module.body, ctx),
            Node::Stmt(stmt) => match stmt {
                Stmt::FunctionDef(function) => {
                    for decorator in &function.decorators {
                        self.visit(Node::Expr(&decorator.expr), ctx);
                    }
                    for default in function.params.iter().filter_map(|p| p.default.as_ref()) {
                        self.visit(Node::Expr(default), ctx);
                    }
                    self.visit_block(&function.body, ctx.enter_function(function));
                }
                Stmt::ClassDef(class) => {
                    for decorator in &class.decorators {
                        self.visit(Node::Expr(&decorator.expr), ctx);
                    }
                    for base in &class.bases {
                        self.visit(Node::Expr(base), ctx);
                    }
                    self.visit_block(&class.body, ctx.enter_class(class));
                }
                Stmt::Return(ret) => {
                    if let Some(value) = &ret.value {
                        self.visit(Node::Expr(value), ctx);
                    }
                }
                Stmt::Assign(assign) => {
                    if let Some(value) = &assign.value {
                        self.visit(Node::Expr(value), ctx);
                    }
                }
                Stmt::Expr(expr) => self.visit(Node::Expr(expr), ctx),
                Stmt::Compound(compound) => {
                    for head in &compound.heads {
                        self.visit(Node::Expr(head), ctx);
                    }
                    for block in &compound.blocks {
                        self.visit_block(block, ctx);
                    }
                }
                Stmt::Import(_)
                | Stmt::Comment(_)
                | Stmt::Pass(_)
                | Stmt::Raise(_)
                | Stmt::Other(_) => {}
            },
            Node::Expr(expr) => match expr {
                Expr::Attribute { value, .. } => self.visit(Node::Expr(value), ctx),
                Expr::Call {
                    func,
                    args,
                    keywords,
                    ..
                } => {
                    self.visit(Node::Expr(func), ctx);
                    for arg in args {
                        self.visit(Node::Expr(arg), ctx);
                    }
                    for keyword in keywords {
                        self.visit(Node::Expr(&keyword.value), ctx);
                    }
                }
                Expr::Collection(_, items, _) => {
                    for item in items {
                        self.visit(Node::Expr(item), ctx);
                    }
                }
                Expr::Literal(..) | Expr::Name(..) | Expr::Other(_) => {}
            },
        }
    }

    fn visit_block<'a>(&mut self, body: &'a [Stmt], ctx: RuleContext<'a>) {
        for stmt in body {
            self.visit(Node::Stmt(stmt), ctx);
        }
    }

    fn collect(&mut self, idx: usize, result: Result<Vec<Violation>, RuleFailure>) {
        match result {
            Ok(violations) => self.outcome.violations.extend(violations),
            Err(failure) => self.fail(idx, failure),
        }
    }

    fn fail(&mut self, idx: usize, failure: RuleFailure) {
        self.failed[idx] = true;
        self.outcome.failures.push(failure);
    }
}
