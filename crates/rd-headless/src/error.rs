//! Headless backend error types.

use thiserror::Error;

/// Headless backend errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeadlessError {
    /// A driver got a lifecycle callback from a module that did not create it.
    #[error("driver '{driver}' was not created by module '{module}'")]
    InvalidModule { driver: String, module: String },
}

impl HeadlessError {
    pub const INVALID_MODULE: u32 = 1 << 1;

    pub const fn code(&self) -> u32 {
        match self {
            Self::InvalidModule { .. } => Self::INVALID_MODULE,
        }
    }
}

impl From<HeadlessError> for rd_core::Error {
    fn from(err: HeadlessError) -> Self {
        Self::Module {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, HeadlessError>;
