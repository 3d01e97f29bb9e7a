//! Cache path utilities - uses ~/.cache/archfix/<project-hash>/

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Get the cache directory for a project.
/// Uses ~/.cache/archfix/<project-hash>/ on Unix, %LOCALAPPDATA%/archfix/<project-hash>/ on Windows.
pub fn get_cache_dir(project_root: &Path) -> PathBuf {
    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("archfix").join(hash_path(project_root))
}

/// Directory holding file snapshots taken during `archfix fix`
pub fn get_backup_dir(project_root: &Path) -> PathBuf {
    get_cache_dir(project_root).join("backups")
}

/// Hash a path to create a unique but deterministic directory name.
/// Uses the canonical path to ensure consistency.
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hash: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();

    // Use the canonical file_name so "." and the absolute path agree
    let project_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{}", project_name, hash)
}
