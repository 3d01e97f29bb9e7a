//! Python file discovery

use archfix::ProjectConfig;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every `*.py` file under `root`, relative to it and sorted, honoring
/// `.gitignore` and the `[exclude]` patterns
pub(super) fn collect_python_files(root: &Path, config: &ProjectConfig) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .add_custom_ignore_filename(".archfixignore");

    let mut files = Vec::new();
    for entry in builder.build().flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if config.should_exclude(relative) {
            debug!("Excluded {}", relative.display());
            continue;
        }
        files.push(relative.to_path_buf());
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collects_python_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for path in [
            "app/domain/user.py",
            "app/readme.md",
            ".venv/lib/site.py",
            "migrations/0001.py",
            "main.py",
        ] {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, "").unwrap();
        }
        let mut config = ProjectConfig::default();
        config.exclude.paths.push("migrations/".to_string());

        let files = collect_python_files(dir.path(), &config);
        assert_eq!(
            files,
            vec![PathBuf::from("app/domain/user.py"), PathBuf::from("main.py")]
        );
    }
}
