//! Rule engine
//!
//! Evaluates a rule selection over files: parses, walks, and turns fixable
//! violations into plans. Files are evaluated in parallel with rayon; rules
//! are shared read-only across workers.

use super::base::Rule;
use super::context::RuleContext;
use super::walker::{guarded, DispatchTable, Walker};
use crate::analyzer::SemanticAnalyzer;
use crate::config::ProjectConfig;
use crate::fixes::{DeterministicFixGate, TransformationPlan};
use crate::layers::LayerClassifier;
use crate::models::{FixType, RuleFailure, Violation};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Which rules a pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSelection {
    All,
    /// `Code` rules that add type hints
    TypeHints,
    /// Every other `Code` rule
    Architecture,
    /// Comment-only rules
    Governance,
}

impl RuleSelection {
    const EACH: [RuleSelection; 4] = [
        RuleSelection::All,
        RuleSelection::TypeHints,
        RuleSelection::Architecture,
        RuleSelection::Governance,
    ];

    pub fn includes(&self, rule: &dyn Rule) -> bool {
        match self {
            RuleSelection::All => true,
            RuleSelection::TypeHints => rule.fix_type() == FixType::Code && rule.is_type_hint(),
            RuleSelection::Architecture => {
                rule.fix_type() == FixType::Code && !rule.is_type_hint()
            }
            RuleSelection::Governance => rule.fix_type() == FixType::CommentOnly,
        }
    }
}

/// Rules registered for a run, in registration order
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalogue minus rules disabled in `config`
    pub fn with_defaults(config: &ProjectConfig) -> Self {
        let mut registry = Self::new();
        for rule in super::default_rules(config) {
            if config.is_rule_enabled(rule.code(), rule.name()) {
                registry.register(rule);
            } else {
                debug!("Rule {} disabled by configuration", rule.code());
            }
        }
        registry
    }

    /// Register a rule. A second rule with the same code is ignored.
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        if self.get(rule.code()).is_some() {
            warn!("Rule {} already registered, ignoring duplicate", rule.code());
            return;
        }
        debug!("Registering rule: {} ({})", rule.code(), rule.name());
        self.rules.push(rule);
    }

    pub fn get(&self, code: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.code() == code)
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of evaluating one file
#[derive(Debug, Default)]
pub struct FileEvaluation {
    /// Path as given to the engine
    pub path: PathBuf,
    pub violations: Vec<Violation>,
    /// Plans for every fixable violation, in violation order
    pub plans: Vec<TransformationPlan>,
    pub failures: Vec<RuleFailure>,
    /// Set when the file could not be parsed; nothing else is then reported
    pub parse_error: Option<String>,
}

impl FileEvaluation {
    pub fn has_plans(&self) -> bool {
        !self.plans.is_empty()
    }
}

struct SelectionTable {
    selection: RuleSelection,
    rules: Vec<Arc<dyn Rule>>,
    table: DispatchTable,
}

pub struct RuleEngine {
    registry: RuleRegistry,
    selections: Vec<SelectionTable>,
    analyzer: Arc<dyn SemanticAnalyzer>,
    classifier: Arc<LayerClassifier>,
    config: Arc<ProjectConfig>,
    gate: DeterministicFixGate,
}

impl RuleEngine {
    pub fn new(
        registry: RuleRegistry,
        analyzer: Arc<dyn SemanticAnalyzer>,
        classifier: Arc<LayerClassifier>,
        config: Arc<ProjectConfig>,
    ) -> Self {
        let selections = RuleSelection::EACH
            .iter()
            .map(|&selection| {
                let rules: Vec<Arc<dyn Rule>> = registry
                    .rules()
                    .iter()
                    .filter(|r| selection.includes(r.as_ref()))
                    .cloned()
                    .collect();
                let table = DispatchTable::build(&rules);
                SelectionTable {
                    selection,
                    rules,
                    table,
                }
            })
            .collect();

        Self {
            registry,
            selections,
            analyzer,
            classifier,
            config,
            gate: DeterministicFixGate::new(),
        }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn analyzer(&self) -> &Arc<dyn SemanticAnalyzer> {
        &self.analyzer
    }

    /// Whether `selection` contains any rule at all
    pub fn has_rules(&self, selection: RuleSelection) -> bool {
        self.selection(selection).is_some_and(|s| !s.rules.is_empty())
    }

    /// Evaluate many files in parallel. Output order follows `files`.
    pub fn evaluate(&self, files: &[PathBuf], selection: RuleSelection) -> Vec<FileEvaluation> {
        files
            .par_iter()
            .map(|path| self.evaluate_file(path, selection))
            .collect()
    }

    pub fn evaluate_file(&self, path: &Path, selection: RuleSelection) -> FileEvaluation {
        let mut evaluation = FileEvaluation {
            path: path.to_path_buf(),
            ..Default::default()
        };
        let Some(selected) = self.selection(selection) else {
            return evaluation;
        };

        let module = match self.analyzer.parse(path) {
            Ok(module) => module,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                evaluation.parse_error = Some(e.to_string());
                return evaluation;
            }
        };

        let ctx = RuleContext::new(
            &module,
            self.analyzer.as_ref(),
            &self.classifier,
            &self.config,
            &self.gate,
        );
        let outcome = Walker::new(&selected.rules, &selected.table).run(ctx);
        evaluation.failures = outcome.failures;

        for violation in &outcome.violations {
            if !violation.is_fixable() {
                continue;
            }
            let Some(fixable) = self
                .registry
                .get(violation.code())
                .and_then(|rule| rule.as_fixable())
            else {
                continue;
            };
            match guarded(violation.code(), ctx.file, || fixable.fix(violation, &ctx)) {
                Ok(plans) if plans.is_empty() => {
                    debug!(
                        "Rule {} produced no plan for {}",
                        violation.code(),
                        violation.location()
                    );
                }
                Ok(plans) => evaluation.plans.extend(plans),
                Err(failure) => evaluation.failures.push(failure),
            }
        }
        evaluation.violations = outcome.violations;

        debug!(
            "Evaluated {}: {} violations, {} plans",
            path.display(),
            evaluation.violations.len(),
            evaluation.plans.len()
        );
        evaluation
    }

    /// Instructions a human needs for `violation`
    pub fn instructions(&self, violation: &Violation) -> Option<String> {
        let rule = self.registry.get(violation.code())?;
        match rule.as_fixable() {
            Some(fixable) => Some(fixable.fix_instructions(violation)),
            None => violation
                .fix_failure_reason()
                .map(str::to_string)
                .or_else(|| Some(rule.description().to_string())),
        }
    }

    fn selection(&self, selection: RuleSelection) -> Option<&SelectionTable> {
        self.selections.iter().find(|s| s.selection == selection)
    }
}

/// Builder for [`RuleEngine`]
pub struct RuleEngineBuilder {
    registry: RuleRegistry,
    analyzer: Arc<dyn SemanticAnalyzer>,
    config: Arc<ProjectConfig>,
}

impl RuleEngineBuilder {
    pub fn new(analyzer: Arc<dyn SemanticAnalyzer>, config: Arc<ProjectConfig>) -> Self {
        Self {
            registry: RuleRegistry::new(),
            analyzer,
            config,
        }
    }

    /// Register the built-in catalogue, honoring `enabled = false` overrides
    pub fn default_rules(mut self) -> Self {
        for rule in RuleRegistry::with_defaults(&self.config).rules {
            self.registry.register(rule);
        }
        self
    }

    pub fn rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.registry.register(rule);
        self
    }

    pub fn build(self) -> RuleEngine {
        let classifier = Arc::new(LayerClassifier::new(Arc::clone(&self.config)));
        RuleEngine::new(self.registry, self.analyzer, classifier, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PythonAnalyzer;
    use crate::config::RuleConfigOverride;

    fn engine_for(dir: &Path, config: ProjectConfig) -> RuleEngine {
        let analyzer: Arc<dyn SemanticAnalyzer> = Arc::new(PythonAnalyzer::new(dir));
        RuleEngineBuilder::new(analyzer, Arc::new(config))
            .default_rules()
            .build()
    }

    #[test]
    fn test_selections_partition_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path(), ProjectConfig::default());
        let codes = |selection: RuleSelection| -> Vec<&str> {
            engine
                .registry()
                .rules()
                .iter()
                .filter(|r| selection.includes(r.as_ref()))
                .map(|r| r.code())
                .collect()
        };
        assert_eq!(codes(RuleSelection::TypeHints), vec!["TYP001", "TYP002"]);
        assert_eq!(codes(RuleSelection::Architecture), vec!["ARC002", "ARC003"]);
        assert_eq!(codes(RuleSelection::Governance), vec!["ARC001", "TST001"]);
        assert_eq!(codes(RuleSelection::All).len(), 6);
    }

    #[test]
    fn test_disabled_rules_are_not_registered() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.rules.insert(
            "TYP002".into(),
            RuleConfigOverride {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let engine = engine_for(dir.path(), config);
        assert!(engine.registry().get("TYP002").is_none());
        assert!(engine.registry().get("TYP001").is_some());
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let config = ProjectConfig::default();
        let mut registry = RuleRegistry::with_defaults(&config);
        let before = registry.len();
        let again = crate::rules::default_rules(&config);
        registry.register(Arc::clone(&again[0]));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_evaluate_file_produces_plans_for_fixable_violations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("greet.py"),
            "def greeting():\n    return \"hello\"\n\ndef mystery(x):\n    return x.value\n",
        )
        .unwrap();
        let engine = engine_for(dir.path(), ProjectConfig::default());

        let evaluation = engine.evaluate_file(Path::new("greet.py"), RuleSelection::TypeHints);
        assert!(evaluation.failures.is_empty());
        assert!(evaluation.parse_error.is_none());

        let typ001: Vec<&Violation> = evaluation
            .violations
            .iter()
            .filter(|v| v.code() == "TYP001")
            .collect();
        assert_eq!(typ001.len(), 2);
        assert!(typ001[0].is_fixable());
        assert!(!typ001[1].is_fixable());
        assert_eq!(typ001[1].fix_failure_reason(), Some("inference failed"));

        assert!(evaluation.plans.iter().any(|p| matches!(
            p,
            TransformationPlan::AddReturnType { function, type_name }
                if function == "greeting" && type_name.annotation() == "str"
        )));
    }

    #[test]
    fn test_parse_error_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.py"), "def broken(:\n").unwrap();
        let engine = engine_for(dir.path(), ProjectConfig::default());

        let evaluation = engine.evaluate_file(Path::new("broken.py"), RuleSelection::All);
        assert!(evaluation.parse_error.is_some());
        assert!(evaluation.violations.is_empty());
    }

    #[test]
    fn test_parallel_evaluation_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..8 {
            let name = format!("m{}.py", i);
            std::fs::write(dir.path().join(&name), format!("def f{}():\n    return {}\n", i, i))
                .unwrap();
            files.push(PathBuf::from(name));
        }
        let engine = engine_for(dir.path(), ProjectConfig::default());

        let evaluations = engine.evaluate(&files, RuleSelection::TypeHints);
        let paths: Vec<&PathBuf> = evaluations.iter().map(|e| &e.path).collect();
        assert_eq!(paths, files.iter().collect::<Vec<_>>());
        assert!(evaluations.iter().all(|e| e.plans.len() == 1));
    }
}
