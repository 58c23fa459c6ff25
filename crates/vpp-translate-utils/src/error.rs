//! Error types for naming registries, context managers and readers.

use std::path::PathBuf;
use thiserror::Error;
use vpp_api::ReadFailedError;

/// Errors raised by naming registries, context managers and the mapping store.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A name or identity the caller asked for has no mapping.
    #[error("{context}: no mapping for {key}")]
    NotFound { context: String, key: String },

    /// Stored state contradicts what the operation requires.
    #[error("{context}: {message}")]
    InvariantViolation { context: String, message: String },

    #[error("{context}: mapping for {key} already exists")]
    AlreadyExists { context: String, key: String },

    #[error("{context}: invalid argument: {message}")]
    InvalidArgument { context: String, message: String },

    /// A stored value could not be encoded or decoded.
    #[error("Invalid value stored under {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The mapping store snapshot could not be read or written.
    #[error("Mapping store snapshot {path:?}: {message}")]
    Persistence { path: PathBuf, message: String },
}

impl ContextError {
    pub fn not_found(context: impl Into<String>, key: impl ToString) -> Self {
        ContextError::NotFound {
            context: context.into(),
            key: key.to_string(),
        }
    }

    pub fn invariant(context: impl Into<String>, message: impl Into<String>) -> Self {
        ContextError::InvariantViolation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn already_exists(context: impl Into<String>, key: impl ToString) -> Self {
        ContextError::AlreadyExists {
            context: context.into(),
            key: key.to_string(),
        }
    }

    pub fn invalid_argument(context: impl Into<String>, message: impl Into<String>) -> Self {
        ContextError::InvalidArgument {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ContextError::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ContextError::NotFound { .. })
    }

    /// Returns true if stored state is inconsistent with the request.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, ContextError::InvariantViolation { .. })
    }
}

/// Result type for context operations.
pub type ContextResult<T> = std::result::Result<T, ContextError>;

/// Errors of readers that combine engine dumps with naming lookups.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Read(#[from] ReadFailedError),

    #[error(transparent)]
    Context(#[from] ContextError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranslateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TranslateError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = ContextError::not_found("naming-context/interface-context", "eth0");
        assert_eq!(
            err.to_string(),
            "naming-context/interface-context: no mapping for eth0"
        );
        assert!(err.is_not_found());
        assert!(!err.is_invariant_violation());

        let err = ContextError::invalid_argument(
            "multi-naming-context/bridge",
            "index 2 is lower than start index 3",
        );
        assert_eq!(
            err.to_string(),
            "multi-naming-context/bridge: invalid argument: index 2 is lower than start index 3"
        );
    }

    #[test]
    fn test_context_result_carries_context_error() {
        fn lookup(found: bool) -> ContextResult<u32> {
            if found {
                Ok(3)
            } else {
                Err(ContextError::invariant("vpp-acl-context/acl", "no index for acl-1"))
            }
        }

        assert_eq!(lookup(true).unwrap(), 3);
        assert!(lookup(false).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_translate_error_wraps_context_error() {
        let err: TranslateError = ContextError::not_found("naming-context/interface-context", "eth0").into();
        assert!(matches!(err, TranslateError::Context(ref e) if e.is_not_found()));
        assert_eq!(
            err.to_string(),
            "naming-context/interface-context: no mapping for eth0"
        );
    }
}
