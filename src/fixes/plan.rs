//! Transformation plans
//!
//! A plan names what to change by symbol, never by position. The applier
//! resolves positions against the file as it is when the plan runs.

use super::gate::ApprovedType;
use std::fmt;

/// Where an injected comment goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAnchor {
    /// Function or class, by qualified name
    Symbol(String),
    /// Import statement, by module as written (`..domain.user`)
    Import(String),
}

impl fmt::Display for CommentAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentAnchor::Symbol(name) => write!(f, "{}", name),
            CommentAnchor::Import(module) => write!(f, "import {}", module),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformationPlan {
    AddImport {
        module: String,
        name: String,
    },
    AddReturnType {
        function: String,
        type_name: ApprovedType,
    },
    AddParameterType {
        function: String,
        parameter: String,
        type_name: ApprovedType,
    },
    FreezeRecord {
        class_name: String,
    },
    InjectComment {
        anchor: CommentAnchor,
        text: String,
    },
}

impl TransformationPlan {
    /// The symbol this plan edits, for error messages
    pub fn target(&self) -> String {
        match self {
            TransformationPlan::AddImport { module, name } => format!("{}.{}", module, name),
            TransformationPlan::AddReturnType { function, .. } => function.clone(),
            TransformationPlan::AddParameterType {
                function,
                parameter,
                ..
            } => format!("{}({})", function, parameter),
            TransformationPlan::FreezeRecord { class_name } => class_name.clone(),
            TransformationPlan::InjectComment { anchor, .. } => anchor.to_string(),
        }
    }

    pub fn is_comment_only(&self) -> bool {
        matches!(self, TransformationPlan::InjectComment { .. })
    }
}

impl fmt::Display for TransformationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformationPlan::AddImport { module, name } => {
                write!(f, "add `from {} import {}`", module, name)
            }
            TransformationPlan::AddReturnType {
                function,
                type_name,
            } => write!(f, "annotate {} with `-> {}`", function, type_name),
            TransformationPlan::AddParameterType {
                function,
                parameter,
                type_name,
            } => write!(
                f,
                "annotate parameter `{}` of {} as `{}`",
                parameter, function, type_name
            ),
            TransformationPlan::FreezeRecord { class_name } => {
                write!(f, "make dataclass {} frozen", class_name)
            }
            TransformationPlan::InjectComment { anchor, text } => {
                write!(f, "comment on {}: {}", anchor, text)
            }
        }
    }
}
