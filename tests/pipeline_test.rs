//! End-to-end pipeline behavior on small fixture projects
//!
//! Every test uses a fake test oracle and no external formatter, so the
//! results depend only on the rules, the gate and the applier.

use archfix::analyzer::{python, PythonAnalyzer, SemanticAnalyzer};
use archfix::config::PipelineConfig;
use archfix::error::ApplyError;
use archfix::fixes::{FixApplier, SourceFixApplier, TransformationPlan};
use archfix::models::Pass;
use archfix::pipeline::{NoopFormatter, OracleOutcome, RemediationPipeline, TestOracle};
use archfix::rules::{RuleEngineBuilder, RuleSelection};
use archfix::ProjectConfig;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const ORDER: &str = "from dataclasses import dataclass\nfrom app.infrastructure.db import Session\n\n\n@dataclass\nclass Order:\n    id: int\n\n    def total(self):\n        return 0\n";

const POLICY: &str = "from app.infrastructure.db import Session\n\n\ndef make() -> int:\n    return 1\n";

const DB: &str = "class Session:\n    def close(self) -> None:\n        pass\n";

const GREET: &str = "def greeting():\n    return \"hello\"\n\n\ndef relay():\n    return greeting()\n";

const TEST_ORDER: &str = "from unittest.mock import Mock\n\n\ndef test_heavy() -> None:\n    a = Mock()\n    b = Mock()\n    c = Mock()\n    d = Mock()\n    assert a is not b\n";

const BROKEN: &str = "def broken(:\n    return\n";

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, content) in [
        ("app/__init__.py", ""),
        ("app/domain/__init__.py", ""),
        ("app/domain/order.py", ORDER),
        ("app/domain/policy.py", POLICY),
        ("app/infrastructure/__init__.py", ""),
        ("app/infrastructure/db.py", DB),
        ("app/greet.py", GREET),
        ("app/broken.py", BROKEN),
        ("tests/test_order.py", TEST_ORDER),
    ] {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn files() -> Vec<PathBuf> {
    [
        "app/__init__.py",
        "app/broken.py",
        "app/domain/__init__.py",
        "app/domain/order.py",
        "app/domain/policy.py",
        "app/greet.py",
        "app/infrastructure/__init__.py",
        "app/infrastructure/db.py",
        "tests/test_order.py",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    files()
        .into_iter()
        .map(|f| {
            let bytes = fs::read(root.join(&f)).unwrap();
            (f, bytes)
        })
        .collect()
}

fn config() -> Arc<ProjectConfig> {
    Arc::new(ProjectConfig {
        pipeline: PipelineConfig {
            validate: true,
            backup: false,
            backup_dir: Some(PathBuf::from(".snapshots")),
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Reports a fixed failure count for the baseline and another afterwards
struct FakeOracle {
    baseline: usize,
    after: usize,
    runs: AtomicUsize,
}

impl FakeOracle {
    fn passing() -> Arc<Self> {
        Self::new(0, 0)
    }

    fn new(baseline: usize, after: usize) -> Arc<Self> {
        Arc::new(Self {
            baseline,
            after,
            runs: AtomicUsize::new(0),
        })
    }
}

impl TestOracle for FakeOracle {
    fn run(&self) -> OracleOutcome {
        let failures = if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            self.baseline
        } else {
            self.after
        };
        OracleOutcome::Completed { failures }
    }
}

/// Source applier that logs every plan it is handed
#[derive(Default)]
struct RecordingApplier {
    inner: SourceFixApplier,
    log: Mutex<Vec<TransformationPlan>>,
}

impl FixApplier for RecordingApplier {
    fn apply(&self, path: &Path, plans: &[TransformationPlan]) -> Result<bool, ApplyError> {
        self.log.lock().unwrap().extend(plans.iter().cloned());
        self.inner.apply(path, plans)
    }
}

fn pipeline(root: &Path, oracle: Arc<dyn TestOracle>) -> RemediationPipeline {
    RemediationPipeline::builder(root, config())
        .oracle(oracle)
        .formatter(Arc::new(NoopFormatter))
        .build()
        .unwrap()
}

fn codes(root: &Path, file: &str) -> Vec<String> {
    let engine = RuleEngineBuilder::new(Arc::new(PythonAnalyzer::new(root)), config())
        .default_rules()
        .build();
    engine
        .evaluate_file(Path::new(file), RuleSelection::All)
        .violations
        .iter()
        .map(|v| v.code().to_string())
        .collect()
}

fn read(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join(file)).unwrap()
}

#[test]
fn test_greeting_relay_chain_resolves_in_one_run() {
    let dir = project();
    let root = dir.path();

    let mut before = codes(root, "app/greet.py");
    before.sort();
    assert_eq!(before, vec!["ARC002", "TYP001", "TYP001"]);

    let summary = pipeline(root, FakeOracle::passing()).run(&files()).unwrap();

    assert_eq!(
        read(root, "app/greet.py"),
        "def greeting() -> str:\n    return \"hello\"\n\n\ndef relay() -> str:\n    return greeting()\n"
    );
    assert!(codes(root, "app/greet.py").is_empty());
    assert!(summary
        .unresolved
        .iter()
        .all(|v| v.location().file != Path::new("app/greet.py")));
}

#[test]
fn test_second_run_changes_nothing() {
    let dir = project();
    let root = dir.path();

    let first = pipeline(root, FakeOracle::passing()).run(&files()).unwrap();
    assert!(first.modified_count() > 0);
    let after_first = snapshot(root);

    let second = pipeline(root, FakeOracle::passing()).run(&files()).unwrap();
    assert_eq!(second.modified_count(), 0);
    assert_eq!(second.rolled_back_count(), 0);
    assert_eq!(snapshot(root), after_first);
}

#[test]
fn test_regressing_edits_restore_exact_bytes() {
    let dir = project();
    let root = dir.path();
    let before = snapshot(root);

    let summary = pipeline(root, FakeOracle::new(0, 1)).run(&files()).unwrap();

    assert_eq!(snapshot(root), before);
    assert_eq!(summary.modified_count(), 0);
    assert!(summary.rolled_back_count() > 0);
    assert_eq!(summary.rolled_back_count(), summary.rolled_back_files().count());
    assert!(summary
        .regressions
        .iter()
        .all(|r| r.baseline == Some(0) && r.observed == Some(1)));
}

#[test]
fn test_pre_existing_failures_are_not_regressions() {
    let dir = project();
    let root = dir.path();

    let summary = pipeline(root, FakeOracle::new(2, 2)).run(&files()).unwrap();
    assert_eq!(summary.baseline_failures, Some(2));
    assert!(summary.regressions.is_empty());
    assert!(summary.modified_count() > 0);
}

#[test]
fn test_edits_keep_every_file_parseable() {
    let dir = project();
    let root = dir.path();

    pipeline(root, FakeOracle::passing()).run(&files()).unwrap();

    assert_eq!(read(root, "app/broken.py"), BROKEN);
    for file in files() {
        if file == Path::new("app/broken.py") {
            continue;
        }
        let source = read(root, file.to_str().unwrap());
        assert!(python::is_valid(&source), "{} no longer parses", file.display());
    }
    assert!(read(root, "app/domain/order.py").contains("@dataclass(frozen=True)"));
    assert!(read(root, "app/domain/order.py").contains("def total(self) -> int:"));
}

#[test]
fn test_hints_then_architecture_then_comments() {
    let dir = project();
    let root = dir.path();
    let applier = Arc::new(RecordingApplier::default());

    let summary = RemediationPipeline::builder(root, config())
        .oracle(FakeOracle::passing())
        .formatter(Arc::new(NoopFormatter))
        .applier(applier.clone())
        .build()
        .unwrap()
        .run(&files())
        .unwrap();

    let rank = |plan: &TransformationPlan| match plan {
        TransformationPlan::AddImport { .. }
        | TransformationPlan::AddReturnType { .. }
        | TransformationPlan::AddParameterType { .. } => 0,
        TransformationPlan::FreezeRecord { .. } => 1,
        TransformationPlan::InjectComment { .. } => 2,
    };
    let ranks: Vec<u8> = applier.log.lock().unwrap().iter().map(rank).collect();
    assert!(ranks.contains(&0) && ranks.contains(&1) && ranks.contains(&2));
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "{:?}", ranks);

    let passes: Vec<Pass> = summary.passes.iter().map(|(p, _)| *p).collect();
    assert_eq!(passes, Pass::ORDER.to_vec());
}

#[test]
fn test_comment_only_fixes_preserve_the_syntax_tree() {
    let dir = project();
    let root = dir.path();
    let analyzer = PythonAnalyzer::new(root);
    let skeleton = |file: &str| analyzer.parse(Path::new(file)).unwrap().skeleton();

    let policy_before = skeleton("app/domain/policy.py");
    let test_before = skeleton("tests/test_order.py");

    pipeline(root, FakeOracle::passing()).run(&files()).unwrap();
    analyzer.clear_cache();

    assert_eq!(skeleton("app/domain/policy.py"), policy_before);
    assert_eq!(skeleton("tests/test_order.py"), test_before);

    for (file, original) in [("app/domain/policy.py", POLICY), ("tests/test_order.py", TEST_ORDER)] {
        let edited = read(root, file);
        assert_ne!(edited, original, "{} got no comment", file);
        let without_tags: String = edited
            .lines()
            .filter(|l| !l.trim_start().starts_with("# archfix:"))
            .map(|l| format!("{}\n", l))
            .collect();
        assert_eq!(without_tags, original);
    }
}
