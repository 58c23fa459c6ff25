//! Engine error types and reply status handling.
//!
//! Every engine reply carries a signed `retval`; zero is success and the
//! negative values are the engine's error numbers. [`ApiStatus`] decodes the
//! common ones, [`ApiError`] is what a failed call returns, and
//! [`ReadFailedError`] / [`WriteFailedError`] are what translators see once a
//! call has been tied to the data-tree node it was made for.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use vpp_types::InstanceId;

/// Decoded engine `retval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiStatus {
    Success,
    Unspecified,
    InvalidSwIfIndex,
    NoSuchFib,
    NoSuchInnerFib,
    NoSuchLabel,
    NoSuchEntry,
    InvalidValue,
    InvalidValue2,
    Unimplemented,
    InvalidSwIfIndex2,
    /// A retval this layer has no name for.
    Other(i32),
}

impl ApiStatus {
    /// Decodes a raw retval.
    pub fn from_retval(retval: i32) -> Self {
        match retval {
            0 => ApiStatus::Success,
            -1 => ApiStatus::Unspecified,
            -2 => ApiStatus::InvalidSwIfIndex,
            -3 => ApiStatus::NoSuchFib,
            -4 => ApiStatus::NoSuchInnerFib,
            -5 => ApiStatus::NoSuchLabel,
            -6 => ApiStatus::NoSuchEntry,
            -7 => ApiStatus::InvalidValue,
            -8 => ApiStatus::InvalidValue2,
            -9 => ApiStatus::Unimplemented,
            -10 => ApiStatus::InvalidSwIfIndex2,
            other => ApiStatus::Other(other),
        }
    }

    /// The raw retval.
    pub fn retval(&self) -> i32 {
        match self {
            ApiStatus::Success => 0,
            ApiStatus::Unspecified => -1,
            ApiStatus::InvalidSwIfIndex => -2,
            ApiStatus::NoSuchFib => -3,
            ApiStatus::NoSuchInnerFib => -4,
            ApiStatus::NoSuchLabel => -5,
            ApiStatus::NoSuchEntry => -6,
            ApiStatus::InvalidValue => -7,
            ApiStatus::InvalidValue2 => -8,
            ApiStatus::Unimplemented => -9,
            ApiStatus::InvalidSwIfIndex2 => -10,
            ApiStatus::Other(retval) => *retval,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ApiStatus::Success
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApiStatus::Success => "SUCCESS",
            ApiStatus::Unspecified => "UNSPECIFIED",
            ApiStatus::InvalidSwIfIndex => "INVALID_SW_IF_INDEX",
            ApiStatus::NoSuchFib => "NO_SUCH_FIB",
            ApiStatus::NoSuchInnerFib => "NO_SUCH_INNER_FIB",
            ApiStatus::NoSuchLabel => "NO_SUCH_LABEL",
            ApiStatus::NoSuchEntry => "NO_SUCH_ENTRY",
            ApiStatus::InvalidValue => "INVALID_VALUE",
            ApiStatus::InvalidValue2 => "INVALID_VALUE_2",
            ApiStatus::Unimplemented => "UNIMPLEMENTED",
            ApiStatus::InvalidSwIfIndex2 => "INVALID_SW_IF_INDEX_2",
            ApiStatus::Other(retval) => return write!(f, "RETVAL({})", retval),
        };
        f.write_str(s)
    }
}

/// Error returned by a failed engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The engine answered with a non-zero retval.
    #[error("{request} failed: {status} (retval {})", .status.retval())]
    Retval {
        request: &'static str,
        status: ApiStatus,
    },

    /// The request could not be delivered.
    #[error("{request} could not be sent: {message}")]
    Send {
        request: &'static str,
        message: String,
    },

    /// The connection to the engine is gone.
    #[error("engine connection closed")]
    Disconnected,
}

impl ApiError {
    /// Creates an error from a raw retval.
    pub fn from_retval(request: &'static str, retval: i32) -> Self {
        ApiError::Retval {
            request,
            status: ApiStatus::from_retval(retval),
        }
    }

    pub fn send(request: &'static str, message: impl Into<String>) -> Self {
        ApiError::Send {
            request,
            message: message.into(),
        }
    }

    /// Returns the engine status if this is a retval error.
    pub fn status(&self) -> Option<ApiStatus> {
        match self {
            ApiError::Retval { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for engine calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// A read of one data-tree node could not be served.
///
/// Never cached: the caller may retry within the same transaction.
#[derive(Debug, Clone, Error)]
pub enum ReadFailedError {
    #[error("Read of {id} timed out after {timeout:?}")]
    Timeout { id: InstanceId, timeout: Duration },

    #[error("Failed to read {id}: {source}")]
    Failed {
        id: InstanceId,
        #[source]
        source: ApiError,
    },

    /// The identifier does not address what the reader expects, e.g. it
    /// lacks a parent key the dump is scoped by.
    #[error("Cannot read {id}: {message}")]
    InvalidIdentifier { id: InstanceId, message: String },
}

impl ReadFailedError {
    pub fn failed(id: &InstanceId, source: ApiError) -> Self {
        ReadFailedError::Failed {
            id: id.clone(),
            source,
        }
    }

    pub fn invalid_identifier(id: &InstanceId, message: impl Into<String>) -> Self {
        ReadFailedError::InvalidIdentifier {
            id: id.clone(),
            message: message.into(),
        }
    }

    /// The node whose read failed.
    pub fn id(&self) -> &InstanceId {
        match self {
            ReadFailedError::Timeout { id, .. }
            | ReadFailedError::Failed { id, .. }
            | ReadFailedError::InvalidIdentifier { id, .. } => id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadFailedError::Timeout { .. })
    }
}

/// A write of one data-tree node was rejected by the engine.
#[derive(Debug, Clone, Error)]
pub enum WriteFailedError {
    #[error("Failed to create {id} with data {data}: {source}")]
    Create {
        id: InstanceId,
        data: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to update {id} from {before} to {after}: {source}")]
    Update {
        id: InstanceId,
        before: String,
        after: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to delete {id}: {source}")]
    Delete {
        id: InstanceId,
        #[source]
        source: ApiError,
    },

    #[error("Failed to write {id}: {source}")]
    Failed {
        id: InstanceId,
        #[source]
        source: ApiError,
    },

    #[error("Write of {id} timed out after {timeout:?}")]
    Timeout { id: InstanceId, timeout: Duration },
}

impl WriteFailedError {
    pub fn id(&self) -> &InstanceId {
        match self {
            WriteFailedError::Create { id, .. }
            | WriteFailedError::Update { id, .. }
            | WriteFailedError::Delete { id, .. }
            | WriteFailedError::Failed { id, .. }
            | WriteFailedError::Timeout { id, .. } => id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WriteFailedError::Timeout { .. })
    }
}
