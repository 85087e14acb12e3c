//! Crate-wide error taxonomy shared by the store, sandbox, oracle, agent and
//! gateway crates.

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// All error conditions an operator or a gateway handler needs to tell apart.
/// Variants map onto HTTP status codes and onto sandbox/oracle error kinds at
/// their respective boundaries; nothing upstream needs to parse strings.
#[derive(Debug, Error, Clone, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("name conflict: '{0}' already exists")]
    NameConflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("tool is bugged")]
    ToolBugged,

    #[error("tool is inactive")]
    Inactive,

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("compile error: {0}")]
    CompileError(String),

    #[error("runtime error: {0}")]
    RuntimeError(String),

    #[error("execution timed out")]
    Timeout,

    #[error("resource denied: {0}")]
    ResourceDenied(String),

    #[error("oracle returned an invalid response: {0}")]
    BadOracleResponse(String),

    #[error("oracle request failed: {0}")]
    OracleUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// A short machine-readable tag, used as the sandbox/execution `kind`
    /// field and for REST status mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::NameConflict(_) => "NameConflict",
            Error::NotFound(_) => "NotFound",
            Error::ToolBugged => "ToolBugged",
            Error::Inactive => "Inactive",
            Error::BadArguments(_) => "BadArguments",
            Error::CompileError(_) => "CompileError",
            Error::RuntimeError(_) => "RuntimeError",
            Error::Timeout => "Timeout",
            Error::ResourceDenied(_) => "ResourceDenied",
            Error::BadOracleResponse(_) => "BadOracleResponse",
            Error::OracleUnavailable(_) => "OracleUnavailable",
            Error::Storage(_) => "StorageError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Whether a caller might reasonably retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::OracleUnavailable(_) | Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_for_each_variant() {
        assert_eq!(Error::ToolBugged.kind(), "ToolBugged");
        assert_eq!(Error::NotFound("x".into()).kind(), "NotFound");
    }

    #[test]
    fn transient_errors_are_flagged() {
        assert!(Error::OracleUnavailable("timeout".into()).is_transient());
        assert!(!Error::ToolBugged.is_transient());
    }
}
