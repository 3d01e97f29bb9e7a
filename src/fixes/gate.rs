//! Deterministic fix gate
//!
//! The only place an inferred type becomes something a fix may write into
//! source. Type-hint plans take an [`ApprovedType`], and only
//! [`DeterministicFixGate::approve`] can build one.

use super::plan::TransformationPlan;
use crate::analyzer::{InferredType, Module, SemanticAnalyzer, TypeRef};
use std::fmt;

pub const REASON_INFERENCE_FAILED: &str = "inference failed";
pub const REASON_BANNED_DYNAMIC: &str = "would require banned dynamic type";

/// Why the gate refused a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixRefusal {
    InferenceFailed,
    BannedDynamicType,
}

impl FixRefusal {
    pub fn reason(&self) -> &'static str {
        match self {
            FixRefusal::InferenceFailed => REASON_INFERENCE_FAILED,
            FixRefusal::BannedDynamicType => REASON_BANNED_DYNAMIC,
        }
    }
}

impl fmt::Display for FixRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A type the gate has cleared for materialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedType {
    type_ref: TypeRef,
}

impl ApprovedType {
    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// Text to write after `->` or `:`
    pub fn annotation(&self) -> &str {
        &self.type_ref.name
    }
}

impl fmt::Display for ApprovedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_ref.name)
    }
}

/// `fixable` is never true without a concrete type, and `reason` is always
/// set when it is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub fixable: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicFixGate;

impl DeterministicFixGate {
    pub fn new() -> Self {
        Self
    }

    pub fn can_fix(&self, inferred: &InferredType) -> GateDecision {
        match self.approve(inferred) {
            Ok(_) => GateDecision {
                fixable: true,
                reason: None,
            },
            Err(refusal) => GateDecision {
                fixable: false,
                reason: Some(refusal.reason().to_string()),
            },
        }
    }

    pub fn approve(&self, inferred: &InferredType) -> Result<ApprovedType, FixRefusal> {
        match inferred {
            InferredType::Known(type_ref) => Ok(ApprovedType {
                type_ref: type_ref.clone(),
            }),
            InferredType::Dynamic => Err(FixRefusal::BannedDynamicType),
            InferredType::Unknown => Err(FixRefusal::InferenceFailed),
        }
    }

    /// Import needed before `approved` can be written into `target`.
    ///
    /// None for builtins, for names the target can already see, and for
    /// types defined in the target itself.
    pub fn import_requirement(
        &self,
        analyzer: &dyn SemanticAnalyzer,
        target: &Module,
        approved: &ApprovedType,
    ) -> Option<TransformationPlan> {
        let type_ref = approved.type_ref();
        let module = type_ref.module.as_ref()?;
        if *module == target.name || analyzer.is_reachable(target, type_ref) {
            return None;
        }
        Some(TransformationPlan::AddImport {
            module: module.clone(),
            name: type_ref.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PythonAnalyzer;
    use std::path::Path;

    #[test]
    fn test_unknown_and_dynamic_are_refused_with_reason() {
        let gate = DeterministicFixGate::new();

        let decision = gate.can_fix(&InferredType::Unknown);
        assert!(!decision.fixable);
        assert_eq!(decision.reason.as_deref(), Some("inference failed"));

        let decision = gate.can_fix(&InferredType::Dynamic);
        assert!(!decision.fixable);
        assert_eq!(
            decision.reason.as_deref(),
            Some("would require banned dynamic type")
        );

        let decision = gate.can_fix(&InferredType::builtin("str"));
        assert!(decision.fixable);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_import_requirement() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("models.py"), "class User:\n    pass\n").unwrap();
        std::fs::write(
            dir.path().join("imports_it.py"),
            "from models import User\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("bare.py"), "x = 1\n").unwrap();
        let analyzer = PythonAnalyzer::new(dir.path());
        let gate = DeterministicFixGate::new();

        let user = gate
            .approve(&InferredType::Known(TypeRef::defined_in("User", "models")))
            .unwrap();
        let builtin = gate.approve(&InferredType::builtin("int")).unwrap();

        let bare = analyzer.parse(Path::new("bare.py")).unwrap();
        assert_eq!(
            gate.import_requirement(&analyzer, &bare, &user),
            Some(TransformationPlan::AddImport {
                module: "models".into(),
                name: "User".into()
            })
        );
        assert_eq!(gate.import_requirement(&analyzer, &bare, &builtin), None);

        let importer = analyzer.parse(Path::new("imports_it.py")).unwrap();
        assert_eq!(gate.import_requirement(&analyzer, &importer, &user), None);

        let defining = analyzer.parse(Path::new("models.py")).unwrap();
        assert_eq!(gate.import_requirement(&analyzer, &defining, &user), None);
    }
}
