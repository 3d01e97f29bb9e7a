//! Restore command: roll back snapshots left by an interrupted run

use anyhow::{Context, Result};
use archfix::cache::get_backup_dir;
use archfix::load_project_config;
use archfix::pipeline::BackupStore;
use console::{style, Term};
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Cannot access {}", path.display()))?;
    let config = load_project_config(&root);
    let dir = match &config.pipeline.backup_dir {
        Some(dir) => root.join(dir),
        None => get_backup_dir(&root),
    };

    let term = Term::stderr();
    let store = BackupStore::on_disk(&dir);
    if store.pending().is_empty() {
        term.write_line("Nothing to restore.")?;
        return Ok(());
    }

    let restored = store.recover_pending()?;
    for file in &restored {
        term.write_line(&format!("{} {}", style("Restored").green(), file.display()))?;
    }
    term.write_line(&format!("{} files restored", restored.len()))?;
    Ok(())
}
