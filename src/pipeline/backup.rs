//! File snapshots for per-file rollback
//!
//! Every transactional edit is preceded by a snapshot. The bytes stay in
//! the handle for an exact restore; on-disk stores also copy them under the
//! backup directory and list them in `manifest.json`, so a run that dies
//! between apply and commit can be undone with `archfix restore`.

use crate::error::{PipelineError, PipelineResult};
use crate::fixes::applier::replace_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    id: String,
    original: PathBuf,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: Vec<ManifestEntry>,
}

/// Pre-edit content of one file
#[derive(Debug)]
pub struct SnapshotHandle {
    id: String,
    path: PathBuf,
    content: Vec<u8>,
}

impl SnapshotHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

pub struct BackupStore {
    dir: Option<PathBuf>,
    manifest: Mutex<Manifest>,
}

impl BackupStore {
    /// Store that persists snapshots under `dir`, picking up any manifest a
    /// previous run left behind
    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let manifest = load_manifest(&dir);
        if !manifest.entries.is_empty() {
            warn!(
                "{} snapshot(s) from an interrupted run are pending in {}; run `archfix restore` to roll them back",
                manifest.entries.len(),
                dir.display()
            );
        }
        Self {
            dir: Some(dir),
            manifest: Mutex::new(manifest),
        }
    }

    /// Store that keeps snapshots only in the returned handles
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            manifest: Mutex::new(Manifest::default()),
        }
    }

    /// Copy the current content of `path`
    pub fn snapshot(&self, path: &Path) -> PipelineResult<SnapshotHandle> {
        let backup_err = |source| PipelineError::BackupFailed {
            path: path.to_path_buf(),
            source,
        };

        let content = fs::read(path).map_err(backup_err)?;
        let handle = SnapshotHandle {
            id: Uuid::new_v4().to_string(),
            path: path.to_path_buf(),
            content,
        };

        if let Some(dir) = &self.dir {
            fs::create_dir_all(dir).map_err(backup_err)?;
            fs::write(dir.join(&handle.id), &handle.content).map_err(backup_err)?;

            let mut manifest = self.lock();
            manifest.entries.push(ManifestEntry {
                id: handle.id.clone(),
                original: handle.path.clone(),
                created_at: Utc::now(),
            });
            save_manifest(dir, &manifest).map_err(backup_err)?;
        }

        debug!("Snapshot {} taken of {}", handle.id, path.display());
        Ok(handle)
    }

    /// Write the snapshot back over the file, byte for byte
    pub fn restore(&self, handle: &SnapshotHandle) -> PipelineResult<()> {
        replace_file(&handle.path, &handle.content).map_err(|source| {
            PipelineError::RestoreFailed {
                path: handle.path.clone(),
                source,
            }
        })?;
        debug!("Restored {} from snapshot {}", handle.path.display(), handle.id);
        Ok(())
    }

    /// Drop a snapshot once its edit is committed or reverted
    pub fn discard(&self, handle: SnapshotHandle) {
        let Some(dir) = &self.dir else {
            return;
        };
        let mut manifest = self.lock();
        manifest.entries.retain(|e| e.id != handle.id);
        if let Err(e) = save_manifest(dir, &manifest) {
            warn!("Failed to update backup manifest: {}", e);
        }
        let _ = fs::remove_file(dir.join(&handle.id));
    }

    /// Files with a snapshot still on disk
    pub fn pending(&self) -> Vec<PathBuf> {
        self.lock().entries.iter().map(|e| e.original.clone()).collect()
    }

    /// Restore every snapshot left behind by an interrupted run. When a file
    /// was snapshotted more than once its oldest content wins.
    pub fn recover_pending(&self) -> PipelineResult<Vec<PathBuf>> {
        let Some(dir) = &self.dir else {
            return Ok(vec![]);
        };

        let mut manifest = self.lock();
        let mut restored = Vec::new();
        while let Some(entry) = manifest.entries.pop() {
            let restore_err = |source| PipelineError::RestoreFailed {
                path: entry.original.clone(),
                source,
            };
            let stored = dir.join(&entry.id);
            let content = fs::read(&stored).map_err(restore_err)?;
            replace_file(&entry.original, &content).map_err(restore_err)?;
            let _ = fs::remove_file(&stored);
            save_manifest(dir, &manifest).map_err(restore_err)?;

            info!(
                "Restored {} from snapshot taken {}",
                entry.original.display(),
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if !restored.contains(&entry.original) {
                restored.push(entry.original);
            }
        }
        Ok(restored)
    }

    fn lock(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_manifest(dir: &Path) -> Manifest {
    let path = dir.join(MANIFEST_FILE);
    let Ok(content) = fs::read_to_string(&path) else {
        return Manifest::default();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring unreadable backup manifest {}: {}", path.display(), e);
        Manifest::default()
    })
}

fn save_manifest(dir: &Path, manifest: &Manifest) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(manifest).map_err(std::io::Error::other)?;
    replace_file(&dir.join(MANIFEST_FILE), &json)
}
