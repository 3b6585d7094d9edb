//! Error types shared by every RD crate.

use thiserror::Error;

/// Framework-wide error type.
///
/// Every variant carries a stable numeric code (see [`Error::code`]) so a
/// top-level caller can print the message and exit with the code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An invalid handle was dereferenced, or a null listener was passed.
    #[error("Null reference: {0}")]
    NullReference(String),

    /// A handle was registered where it must be unique, but is already present.
    #[error("Handle not unique ({0})")]
    HandleNotUnique(String),

    /// A required module could not be loaded.
    #[error("{0} required but not loaded")]
    ModuleNotLoaded(String),

    /// An observer vetoed an operation through the notification bus.
    #[error("Abort requested in {module}::{function}: {message}")]
    AbortRequested {
        /// Module that sent the vetoed notification.
        module: String,
        /// Function that sent the vetoed notification.
        function: String,
        /// Message of the vetoed notification.
        message: String,
    },

    /// Module-defined error, carrying the module's own code.
    #[error("{message}")]
    Module {
        /// Error code chosen by the module.
        code: u32,
        /// Formatted message.
        message: String,
    },
}

impl Error {
    /// Code for [`Error::NullReference`].
    pub const NULL_REFERENCE: u32 = 1;
    /// Code for [`Error::HandleNotUnique`].
    pub const HANDLE_NOT_UNIQUE: u32 = 2;
    /// Code for [`Error::ModuleNotLoaded`].
    pub const MODULE_NOT_LOADED: u32 = 3;
    /// Code for [`Error::AbortRequested`].
    pub const ABORT_REQUESTED: u32 = 4;

    /// Numeric code of this error.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::NullReference(_) => Self::NULL_REFERENCE,
            Self::HandleNotUnique(_) => Self::HANDLE_NOT_UNIQUE,
            Self::ModuleNotLoaded(_) => Self::MODULE_NOT_LOADED,
            Self::AbortRequested { .. } => Self::ABORT_REQUESTED,
            Self::Module { code, .. } => *code,
        }
    }

    /// Returns true if this is an [`Error::AbortRequested`].
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::AbortRequested { .. })
    }
}

/// Error returned when parsing a [`Version`](crate::Version) fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseVersionError {
    /// The input was empty.
    #[error("empty version string")]
    Empty,

    /// One component was not a number.
    #[error("invalid version component `{0}`")]
    InvalidComponent(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
