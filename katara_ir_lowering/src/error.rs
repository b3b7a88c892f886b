//! Tool-level error type for the lowering/optimizer passes, distinct from
//! the checker's [`katara_ir_check::CheckerIssueKind`] diagnostics: these
//! represent an internal invariant of a pass being violated (e.g. a value
//! that should already have been decomposed), not a problem in IR text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoweringError {
    #[error("internal error: {0}")]
    Internal(String),
}

pub type LoweringResult<T> = Result<T, LoweringError>;

impl LoweringError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
