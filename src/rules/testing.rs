//! Fixture helpers shared by the rule tests

use super::base::Rule;
use super::context::RuleContext;
use super::walker::{DispatchTable, Walker};
use crate::analyzer::{PythonAnalyzer, SemanticAnalyzer};
use crate::config::ProjectConfig;
use crate::fixes::{DeterministicFixGate, TransformationPlan};
use crate::layers::LayerClassifier;
use crate::models::Violation;
use std::path::Path;
use std::sync::Arc;

pub(crate) struct Fixture {
    _dir: tempfile::TempDir,
    analyzer: PythonAnalyzer,
    config: Arc<ProjectConfig>,
    classifier: LayerClassifier,
    gate: DeterministicFixGate,
}

impl Fixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_config(files, ProjectConfig::default())
    }

    pub fn with_config(files: &[(&str, &str)], config: ProjectConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let analyzer = PythonAnalyzer::new(dir.path());
        let config = Arc::new(config);
        let classifier = LayerClassifier::new(Arc::clone(&config));
        Self {
            _dir: dir,
            analyzer,
            config,
            classifier,
            gate: DeterministicFixGate::new(),
        }
    }

    /// Violations `rule` reports for `path`; panics if the rule fails
    pub fn check(&self, rule: Arc<dyn Rule>, path: &str) -> Vec<Violation> {
        let module = self.analyzer.parse(Path::new(path)).unwrap();
        let ctx = RuleContext::new(
            &module,
            &self.analyzer,
            &self.classifier,
            &self.config,
            &self.gate,
        );
        let rules = vec![rule];
        let table = DispatchTable::build(&rules);
        let outcome = Walker::new(&rules, &table).run(ctx);
        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
        outcome.violations
    }

    /// Plans for every fixable violation `rule` reports for `path`
    pub fn fix(&self, rule: Arc<dyn Rule>, path: &str) -> Vec<TransformationPlan> {
        let violations = self.check(Arc::clone(&rule), path);
        let module = self.analyzer.parse(Path::new(path)).unwrap();
        let ctx = RuleContext::new(
            &module,
            &self.analyzer,
            &self.classifier,
            &self.config,
            &self.gate,
        );
        let fixable = rule.as_fixable().unwrap();
        violations
            .iter()
            .filter(|v| v.is_fixable())
            .flat_map(|v| fixable.fix(v, &ctx).unwrap())
            .collect()
    }
}

pub(crate) fn check_source(rule: impl Rule + 'static, source: &str) -> Vec<Violation> {
    Fixture::new(&[("target.py", source)]).check(Arc::new(rule), "target.py")
}

pub(crate) fn fix_source(
    rule: impl Rule + 'static,
    others: &[(&str, &str)],
    source: &str,
) -> Vec<TransformationPlan> {
    let mut files = others.to_vec();
    files.push(("target.py", source));
    Fixture::new(&files).fix(Arc::new(rule), "target.py")
}
