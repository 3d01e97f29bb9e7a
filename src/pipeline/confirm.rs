//! Interactive confirmation before a file is edited

use crate::fixes::TransformationPlan;
use console::{style, Term};
use std::path::Path;
use tracing::warn;

pub trait Confirmer: Send + Sync {
    /// Whether `plans` may be applied to `path`
    fn confirm(&self, path: &Path, plans: &[TransformationPlan]) -> bool;
}

/// Approves everything (non-interactive runs)
pub struct AutoApprove;

impl Confirmer for AutoApprove {
    fn confirm(&self, _path: &Path, _plans: &[TransformationPlan]) -> bool {
        true
    }
}

/// Lists the plans on stderr and reads y/N from the terminal
pub struct TerminalConfirmer {
    term: Term,
}

impl TerminalConfirmer {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn prompt(&self, path: &Path, plans: &[TransformationPlan]) -> std::io::Result<bool> {
        self.term.write_line(&format!(
            "\n{} {}",
            style("Fix:").green().bold(),
            style(path.display()).cyan()
        ))?;
        for plan in plans {
            self.term.write_line(&format!("  {} {}", style("•").dim(), plan))?;
        }
        self.term
            .write_str(&format!("{} ", style("Apply these changes? [y/N]").bold()))?;
        let answer = self.term.read_line()?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl Default for TerminalConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, path: &Path, plans: &[TransformationPlan]) -> bool {
        match self.prompt(path, plans) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Could not read confirmation, skipping {}: {}", path.display(), e);
                false
            }
        }
    }
}
