//! Tool-level error type, distinct from [`crate::issues::Issue`]: this is for
//! failures that are about the *tool*, not about the IR text it was asked to
//! process (a file that can't be read, an internal invariant broken inside a
//! pass). Mirrors `seen_common::error::SeenError`.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CommonError {
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("internal invariant violated: {message}")]
    Internal { message: String },
}

pub type CommonResult<T> = Result<T, CommonError>;

impl CommonError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(error: std::io::Error) -> Self {
        CommonError::Io { message: error.to_string() }
    }
}
