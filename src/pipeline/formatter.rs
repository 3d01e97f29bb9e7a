//! Mechanical normalization
//!
//! Passes 1 and 5 hand the tree to external formatters (ruff by default)
//! and repeat until the content hash of the target files stops changing.

use super::process::run_tool;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bytes of file arguments handed to one formatter invocation. Large trees
/// are split over several calls to stay well under the OS argv limit.
const ARG_BUDGET: usize = 32 * 1024;

pub trait MechanicalFormatter: Send + Sync {
    /// Normalize `files` (relative to `root`). Returns how many of them
    /// ended up with different content.
    fn normalize(&self, root: &Path, files: &[PathBuf]) -> Result<usize>;
}

/// Formatter that does nothing, used with `--no-format`
pub struct NoopFormatter;

impl MechanicalFormatter for NoopFormatter {
    fn normalize(&self, _root: &Path, _files: &[PathBuf]) -> Result<usize> {
        Ok(0)
    }
}

/// Runs configured commands with the target files appended as arguments
pub struct CommandFormatter {
    commands: Vec<Vec<String>>,
    max_iterations: usize,
    /// Per invocation
    timeout_secs: u64,
    arg_budget: usize,
}

impl CommandFormatter {
    pub fn new(commands: Vec<Vec<String>>, max_iterations: usize) -> Self {
        Self {
            commands,
            max_iterations: max_iterations.max(1),
            timeout_secs: 120,
            arg_budget: ARG_BUDGET,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Run every command once over all batches. Returns false when no
    /// invocation could run.
    fn run_once(&self, root: &Path, files: &[PathBuf]) -> bool {
        let batches = batches(files, self.arg_budget);
        let mut ran_any = false;
        for command in &self.commands {
            let Some(tool) = command.first() else {
                continue;
            };
            for batch in &batches {
                let mut cmd = command.clone();
                cmd.extend(batch.iter().map(|f| f.to_string_lossy().into_owned()));

                let output = run_tool(&cmd, tool, self.timeout_secs, root);
                if !output.success {
                    warn!(
                        "Formatter step skipped: {}",
                        output.error.unwrap_or_else(|| format!("{} failed", tool))
                    );
                    // a missing tool will be missing for every batch
                    if output.return_code.is_none() && !output.timed_out {
                        break;
                    }
                    continue;
                }
                ran_any = true;
                if output.return_code != Some(0) {
                    // Linters exit non-zero for findings they cannot fix; the edits still stand
                    debug!("{} exited with {:?}", tool, output.return_code);
                }
            }
        }
        ran_any
    }
}

/// Split `files` into runs whose joined arguments fit in `budget` bytes.
/// A single oversized path still gets a batch of its own.
fn batches(files: &[PathBuf], budget: usize) -> Vec<&[PathBuf]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for (index, file) in files.iter().enumerate() {
        let size = file.as_os_str().len() + 1;
        if index > start && used + size > budget {
            out.push(&files[start..index]);
            start = index;
            used = 0;
        }
        used += size;
    }
    if start < files.len() {
        out.push(&files[start..]);
    }
    out
}

impl MechanicalFormatter for CommandFormatter {
    fn normalize(&self, root: &Path, files: &[PathBuf]) -> Result<usize> {
        if files.is_empty() || self.commands.is_empty() {
            return Ok(0);
        }

        let initial = file_hashes(root, files);
        let mut previous = tree_hash(&initial);
        for iteration in 1..=self.max_iterations {
            if !self.run_once(root, files) {
                break;
            }
            let current = tree_hash(&file_hashes(root, files));
            if current == previous {
                debug!("Formatter reached a fixed point after {} iterations", iteration);
                break;
            }
            if iteration == self.max_iterations {
                warn!(
                    "Formatter still changing files after {} iterations",
                    self.max_iterations
                );
            }
            previous = current;
        }

        let after = file_hashes(root, files);
        let changed = initial
            .iter()
            .filter(|(path, hash)| after.get(*path) != Some(*hash))
            .count();
        if changed > 0 {
            info!("Formatter normalized {} files", changed);
        }
        Ok(changed)
    }
}

/// Per-file SHA-256 of current content; unreadable files hash as empty
fn file_hashes(root: &Path, files: &[PathBuf]) -> BTreeMap<PathBuf, [u8; 32]> {
    files
        .iter()
        .map(|rel| {
            let content = std::fs::read(root.join(rel)).unwrap_or_default();
            (rel.clone(), Sha256::digest(&content).into())
        })
        .collect()
}

fn tree_hash(hashes: &BTreeMap<PathBuf, [u8; 32]>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (path, hash) in hashes {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(hash);
    }
    hasher.finalize().into()
}
