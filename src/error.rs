//! Error taxonomy
//!
//! Only [`PipelineError`] aborts a run. Everything else is recorded against a
//! rule code or a file and the run carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Raised by the semantic analyzer when a file cannot be turned into a tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {path} at line {line}")]
    Syntax { path: PathBuf, line: u32 },

    #[error("parser unavailable: {0}")]
    Parser(String),
}

/// Raised by a fix applier. The target file is left untouched.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not parse before the edit")]
    UnparsableInput { path: PathBuf },

    #[error("target `{target}` not found in {path}")]
    TargetMissing { path: PathBuf, target: String },

    #[error("edit for `{target}` in {path} produced invalid syntax")]
    BrokenOutput { path: PathBuf, target: String },
}

impl ApplyError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ApplyError::Read { path, .. }
            | ApplyError::Write { path, .. }
            | ApplyError::UnparsableInput { path }
            | ApplyError::TargetMissing { path, .. }
            | ApplyError::BrokenOutput { path, .. } => path,
        }
    }
}

/// Unrecoverable pipeline failures. Proceeding without a rollback safety net
/// is not allowed, so a failed snapshot stops the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not back up {path} before editing: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not restore {path} from its snapshot: {source}")]
    RestoreFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
