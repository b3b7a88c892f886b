//! Tool-level errors distinct from issue-tracker diagnostics (§7): these
//! represent failures of the parsing/printing *machinery* itself, not
//! problems found in the IR text being processed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SerializationResult<T> = Result<T, SerializationError>;
