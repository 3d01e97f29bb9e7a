//! Fix gating, plans and application

pub mod applier;
pub mod gate;
pub mod plan;

pub use applier::{FixApplier, SourceFixApplier, COMMENT_TAG};
pub use gate::{ApprovedType, DeterministicFixGate, FixRefusal, GateDecision};
pub use plan::{CommentAnchor, TransformationPlan};
