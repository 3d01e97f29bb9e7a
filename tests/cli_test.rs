//! CLI contract tests

use std::path::Path;
use std::process::{Command, Output};

fn archfix_bin() -> String {
    env!("CARGO_BIN_EXE_archfix").to_string()
}

fn setup_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let domain = dir.path().join("app/domain");
    std::fs::create_dir_all(&domain).unwrap();
    std::fs::write(
        domain.join("order.py"),
        "from dataclasses import dataclass\n\n\n@dataclass\nclass Order:\n    id: int\n\n\ndef count():\n    return 3\n",
    )
    .unwrap();
    dir
}

fn archfix(root: &Path, args: &[&str]) -> Output {
    Command::new(archfix_bin())
        .arg(root)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .unwrap()
}

#[test]
fn test_check_reports_and_fails() {
    let dir = setup_project();
    let output = archfix(dir.path(), &["check", "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let codes: Vec<&str> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"ARC003"));
    assert!(codes.contains(&"TYP001"));
    assert_eq!(report["files"], 1);
}

#[test]
fn test_check_clean_project_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ok.py"), "def f() -> int:\n    return 1\n").unwrap();
    let output = archfix(dir.path(), &["check"]);
    assert!(output.status.success());
}

#[test]
fn test_fix_without_validation() {
    let dir = setup_project();
    let output = archfix(
        dir.path(),
        &["fix", "--no-validate", "--no-backup", "--no-format", "--format", "json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let source = std::fs::read_to_string(dir.path().join("app/domain/order.py")).unwrap();
    assert!(source.contains("@dataclass(frozen=True)"));
    assert!(source.contains("def count() -> int:"));

    let after = archfix(dir.path(), &["check"]);
    assert!(after.status.success());
}

#[test]
fn test_rules_lists_catalogue() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("archfix.toml"),
        "[rules.TYP002]\nenabled = false\n",
    )
    .unwrap();
    let output = archfix(dir.path(), &["rules"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for code in ["TYP001", "TYP002", "ARC001", "ARC002", "ARC003", "TST001"] {
        assert!(stdout.contains(code), "missing {}", code);
    }
    let typ002 = stdout.lines().find(|l| l.contains("TYP002")).unwrap();
    assert!(typ002.contains("off"));
}

#[test]
fn test_restore_with_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("archfix.toml"),
        "[pipeline]\nbackup_dir = \"snapshots\"\n",
    )
    .unwrap();
    let output = archfix(dir.path(), &["restore"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nothing to restore"));
}
