//! Semantic checker for the textual IR (§4.4): SSA well-formedness,
//! dominance, control-flow structure, and per-instruction type rules.

pub mod checker;
pub mod issues;

pub use checker::check_program;
pub use issues::CheckerIssueKind;
