//! Source fix applier
//!
//! Applies transformation plans to a Python file as text edits. Each plan is
//! resolved against a fresh parse of the text the previous plan produced,
//! all edits happen in memory, and the file is replaced atomically only if
//! the final text still parses.

use super::plan::{CommentAnchor, TransformationPlan};
use crate::analyzer::ast::{Expr, Literal, Module, Span, Stmt};
use crate::analyzer::python;
use crate::error::ApplyError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Tag that starts every comment the applier injects
pub const COMMENT_TAG: &str = "# archfix:";

/// Applies plans to a file on disk
pub trait FixApplier: Send + Sync {
    /// Apply `plans` in order. Returns `Ok(false)` when nothing changed.
    /// On error the file is left untouched.
    fn apply(&self, path: &Path, plans: &[TransformationPlan]) -> Result<bool, ApplyError>;
}

/// Span-based text editing applier for Python sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFixApplier;

impl SourceFixApplier {
    pub fn new() -> Self {
        Self
    }

    /// Apply plans to source text, returning the new text
    pub fn apply_to_source(
        &self,
        path: &Path,
        source: &str,
        plans: &[TransformationPlan],
    ) -> Result<String, ApplyError> {
        if !python::is_valid(source) {
            return Err(ApplyError::UnparsableInput {
                path: path.to_path_buf(),
            });
        }

        let mut text = source.to_string();
        for plan in plans {
            let module = python::parse_source(&text, path, "").map_err(|_| {
                ApplyError::BrokenOutput {
                    path: path.to_path_buf(),
                    target: plan.target(),
                }
            })?;

            let Some(edit) = plan_edit(path, &module, &text, plan)? else {
                debug!("{}: `{}` already satisfied", path.display(), plan);
                continue;
            };
            text.replace_range(edit.start..edit.end, &edit.replacement);

            if !python::is_valid(&text) {
                return Err(ApplyError::BrokenOutput {
                    path: path.to_path_buf(),
                    target: plan.target(),
                });
            }
        }
        Ok(text)
    }
}

impl FixApplier for SourceFixApplier {
    fn apply(&self, path: &Path, plans: &[TransformationPlan]) -> Result<bool, ApplyError> {
        let original = fs::read_to_string(path).map_err(|source| ApplyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let updated = self.apply_to_source(path, &original, plans)?;
        if updated == original {
            return Ok(false);
        }

        write_atomic(path, &updated)?;
        debug!("Applied {} plan(s) to {}", plans.len(), path.display());
        Ok(true)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), ApplyError> {
    replace_file(path, content.as_bytes()).map_err(|source| ApplyError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `path` through a sibling temp file and `rename`
pub(crate) fn replace_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.archfix-tmp", file_name));

    fs::write(&tmp, content)?;
    if let Ok(metadata) = fs::metadata(path) {
        let _ = fs::set_permissions(&tmp, metadata.permissions());
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// A single byte-range replacement
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

impl Edit {
    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            replacement: text.into(),
        }
    }
}

fn missing(path: &Path, target: impl Into<String>) -> ApplyError {
    ApplyError::TargetMissing {
        path: path.to_path_buf(),
        target: target.into(),
    }
}

/// Resolve a plan to an edit. `None` means the plan is already satisfied.
fn plan_edit(
    path: &Path,
    module: &Module,
    text: &str,
    plan: &TransformationPlan,
) -> Result<Option<Edit>, ApplyError> {
    match plan {
        TransformationPlan::AddImport { module: from, name } => {
            Ok(add_import(module, text, from, name))
        }

        TransformationPlan::AddReturnType {
            function,
            type_name,
        } => {
            let f = module
                .find_function(function)
                .ok_or_else(|| missing(path, function))?;
            if f.returns.is_some() {
                return Ok(None);
            }
            Ok(Some(Edit::insert(
                f.params_span.end_byte,
                format!(" -> {}", type_name.annotation()),
            )))
        }

        TransformationPlan::AddParameterType {
            function,
            parameter,
            type_name,
        } => {
            let f = module
                .find_function(function)
                .ok_or_else(|| missing(path, function))?;
            let param = f
                .param(parameter)
                .ok_or_else(|| missing(path, format!("{}({})", function, parameter)))?;
            if param.annotation.is_some() {
                return Ok(None);
            }
            match &param.default {
                // `x=1` becomes `x: int = 1`
                Some(default) => Ok(Some(Edit {
                    start: param.name_span.start_byte,
                    end: default.span().start_byte,
                    replacement: format!("{}: {} = ", param.name, type_name.annotation()),
                })),
                None => Ok(Some(Edit::insert(
                    param.name_span.end_byte,
                    format!(": {}", type_name.annotation()),
                ))),
            }
        }

        TransformationPlan::FreezeRecord { class_name } => {
            let class = module
                .find_class(class_name)
                .ok_or_else(|| missing(path, class_name))?;
            let decorator = class
                .dataclass_decorator()
                .ok_or_else(|| missing(path, format!("@dataclass on {}", class_name)))?;
            Ok(freeze_dataclass(&decorator.expr))
        }

        TransformationPlan::InjectComment { anchor, text: note } => {
            let span = match anchor {
                CommentAnchor::Symbol(qualname) => module
                    .find_function(qualname)
                    .map(|f| f.header)
                    .or_else(|| module.find_class(qualname).map(|c| c.header)),
                CommentAnchor::Import(written) => find_import(&module.body, written),
            }
            .ok_or_else(|| missing(path, anchor.to_string()))?;
            Ok(inject_comment(text, span, note))
        }
    }
}

fn add_import(module: &Module, text: &str, from: &str, name: &str) -> Option<Edit> {
    let already = module.imports().any(|i| {
        i.level == 0
            && i.from_module.as_deref() == Some(from)
            && i.names.iter().any(|n| n.name == name && n.alias.is_none())
    });
    if already {
        return None;
    }

    let line = format!("from {} import {}\n", from, name);

    // after the last top-level import, else after the docstring / header comments
    let anchor = module
        .body
        .iter()
        .rev()
        .find(|s| matches!(s, Stmt::Import(_)))
        .or_else(|| match module.body.first() {
            Some(first) if first.is_docstring() => Some(first),
            _ => module
                .body
                .iter()
                .take_while(|s| matches!(s, Stmt::Comment(_)))
                .last(),
        });

    match anchor {
        Some(stmt) => {
            let end = stmt.span().end_byte;
            match text[end..].find('\n') {
                Some(offset) => Some(Edit::insert(end + offset + 1, line)),
                None => Some(Edit::insert(text.len(), format!("\n{}", line))),
            }
        }
        None => Some(Edit::insert(0, line)),
    }
}

fn freeze_dataclass(expr: &Expr) -> Option<Edit> {
    match expr {
        Expr::Call { keywords, args, span, .. } => {
            if let Some(frozen) = keywords.iter().find(|k| k.name == "frozen") {
                if matches!(frozen.value, Expr::Literal(Literal::Bool(true), _)) {
                    return None;
                }
                let value = frozen.value.span();
                return Some(Edit {
                    start: value.start_byte,
                    end: value.end_byte,
                    replacement: "True".to_string(),
                });
            }
            let last_end = args
                .iter()
                .map(|a| a.span().end_byte)
                .chain(keywords.iter().map(|k| k.value.span().end_byte))
                .max();
            match last_end {
                Some(end) => Some(Edit::insert(end, ", frozen=True")),
                // `@dataclass()`: just before the closing paren
                None => Some(Edit::insert(span.end_byte.saturating_sub(1), "frozen=True")),
            }
        }
        _ => Some(Edit::insert(expr.span().end_byte, "(frozen=True)")),
    }
}

fn find_import(stmts: &[Stmt], written: &str) -> Option<Span> {
    stmts.iter().find_map(|stmt| match stmt {
        Stmt::Import(i) if i.written_modules().iter().any(|m| m == written) => Some(i.span),
        Stmt::Compound(c) => c.blocks.iter().find_map(|b| find_import(b, written)),
        _ => None,
    })
}

/// Insert `# archfix: <note>` on its own line above `span`, matching its
/// indentation. No-op if the comment block directly above already has it.
fn inject_comment(text: &str, span: Span, note: &str) -> Option<Edit> {
    let comment = format!("{} {}", COMMENT_TAG, note);
    let line_start = text[..span.start_byte]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let indent: String = text[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    let already_present = text[..line_start]
        .lines()
        .rev()
        .map(str::trim)
        .take_while(|l| l.starts_with('#'))
        .any(|l| l == comment);
    if already_present {
        return None;
    }

    Some(Edit::insert(line_start, format!("{}{}\n", indent, comment)))
}
