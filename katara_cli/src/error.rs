//! Tool-level errors for the CLI binaries (§7): I/O and argument failures,
//! distinct from the issue-tracker diagnostics the underlying crates report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
