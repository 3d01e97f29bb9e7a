//! Core data models for archfix
//!
//! Violations, pass results and the run summary shared by the rule engine,
//! the remediation pipeline and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A position in a source file (1-based line, 0-based column)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Whether a rule's fix changes code or only adds an explanatory comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixType {
    Code,
    CommentOnly,
}

impl fmt::Display for FixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixType::Code => write!(f, "code"),
            FixType::CommentOnly => write!(f, "comment-only"),
        }
    }
}

/// The symbol a violation is about.
///
/// `symbol` is a qualified name inside the file (`Service.load`), `member`
/// narrows it further (a parameter name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViolationTarget {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

impl ViolationTarget {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            member: None,
        }
    }

    pub fn member(symbol: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            member: Some(member.into()),
        }
    }
}

/// A failed rule check. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    code: String,
    message: String,
    location: Location,
    fixable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fix_failure_reason: Option<String>,
    is_comment_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<ViolationTarget>,
}

impl Violation {
    /// A violation that cannot be fixed automatically.
    pub fn new(code: impl Into<String>, message: impl Into<String>, location: Location) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location,
            fixable: false,
            fix_failure_reason: None,
            is_comment_only: false,
            target: None,
        }
    }

    pub fn with_target(mut self, target: ViolationTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Mark as fixable (clears any failure reason)
    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self.fix_failure_reason = None;
        self
    }

    /// Mark as not fixable, recording why
    pub fn unfixable(mut self, reason: impl Into<String>) -> Self {
        self.fixable = false;
        self.fix_failure_reason = Some(reason.into());
        self
    }

    pub fn comment_only(mut self) -> Self {
        self.is_comment_only = true;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_fixable(&self) -> bool {
        self.fixable
    }

    pub fn fix_failure_reason(&self) -> Option<&str> {
        self.fix_failure_reason.as_deref()
    }

    pub fn is_comment_only(&self) -> bool {
        self.is_comment_only
    }

    pub fn target(&self) -> Option<&ViolationTarget> {
        self.target.as_ref()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.location, self.code, self.message)
    }
}

/// The ordered stages of the remediation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    MechanicalNormalization,
    TypeHints,
    ArchitectureFixes,
    GovernanceAnnotations,
    FinalCleanup,
}

impl Pass {
    pub const ORDER: [Pass; 5] = [
        Pass::MechanicalNormalization,
        Pass::TypeHints,
        Pass::ArchitectureFixes,
        Pass::GovernanceAnnotations,
        Pass::FinalCleanup,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Pass::MechanicalNormalization => 1,
            Pass::TypeHints => 2,
            Pass::ArchitectureFixes => 3,
            Pass::GovernanceAnnotations => 4,
            Pass::FinalCleanup => 5,
        }
    }

    /// Passes that edit files through rule plans (as opposed to the formatter)
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            Pass::TypeHints | Pass::ArchitectureFixes | Pass::GovernanceAnnotations
        )
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pass::MechanicalNormalization => "mechanical normalization",
            Pass::TypeHints => "type hints",
            Pass::ArchitectureFixes => "architecture fixes",
            Pass::GovernanceAnnotations => "governance annotations",
            Pass::FinalCleanup => "final cleanup",
        };
        write!(f, "pass {} ({})", self.number(), name)
    }
}

/// Outcome of one pass on one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassResult {
    pub modified_count: usize,
    pub rolled_back: bool,
}

impl PassResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn modified() -> Self {
        Self {
            modified_count: 1,
            rolled_back: false,
        }
    }

    pub fn rolled_back() -> Self {
        Self {
            modified_count: 0,
            rolled_back: true,
        }
    }
}

/// A rule that returned an error or panicked while evaluating a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub code: String,
    pub file: PathBuf,
    pub message: String,
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed on {}: {}", self.code, self.file.display(), self.message)
    }
}

/// A file whose fixes raised the test failure count and were reverted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Regression {
    pub file: PathBuf,
    pub pass: Pass,
    pub baseline: Option<usize>,
    pub observed: Option<usize>,
}

/// A file the applier refused to edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplierFailure {
    pub file: PathBuf,
    pub pass: Pass,
    pub cause: String,
}

/// Aggregate of one pass over every file
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub files_evaluated: usize,
    pub modified_count: usize,
    pub rolled_back_count: usize,
    pub violations: usize,
}

impl PassSummary {
    pub fn add(&mut self, result: PassResult) {
        self.modified_count += result.modified_count;
        if result.rolled_back {
            self.rolled_back_count += 1;
        }
    }
}

/// Everything a run reports back to the operator
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub passes: Vec<(Pass, PassSummary)>,
    modified: BTreeSet<PathBuf>,
    rolled_back: BTreeSet<PathBuf>,
    pub rule_failures: Vec<RuleFailure>,
    pub applier_failures: Vec<ApplierFailure>,
    pub regressions: Vec<Regression>,
    /// Violations still present after the run that need a human
    pub unresolved: Vec<Violation>,
    pub baseline_failures: Option<usize>,
}

impl RunSummary {
    pub fn record_file(&mut self, path: &Path, result: PassResult) {
        if result.modified_count > 0 {
            self.modified.insert(path.to_path_buf());
        }
        if result.rolled_back {
            self.rolled_back.insert(path.to_path_buf());
        }
    }

    pub fn record_pass(&mut self, pass: Pass, summary: PassSummary) {
        self.passes.push((pass, summary));
    }

    /// Distinct files changed and kept by passes 2-4
    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    /// Distinct files reverted in at least one pass
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }

    pub fn modified_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.modified.iter()
    }

    pub fn rolled_back_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.rolled_back.iter()
    }

    pub fn pass(&self, pass: Pass) -> Option<&PassSummary> {
        self.passes.iter().find(|(p, _)| *p == pass).map(|(_, s)| s)
    }
}
