//! Error types for the sync client.
//!
//! # Design
//! `ApiError` is the taxonomy callers see from every controller operation.
//! Transport failures and backend rejections are kept apart because the
//! controller renders them differently: a rejection carries the backend's own
//! `error` text when it sent one, a transport failure never reaches the
//! backend at all. No variant is fatal; the controller stays usable after any
//! of them.

use thiserror::Error;

/// Failure reported by a `Transport` when no usable response came back. A
/// received non-2xx response is not a `TransportError`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// DNS, connect, timeout, or the connection dropped mid-response.
    #[error("{0}")]
    Unreachable(String),

    /// The backend answered but its body could not be read (over the size
    /// limit, undecodable text).
    #[error("unreadable response body: {0}")]
    UnreadableBody(String),
}

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError::Unreachable(msg.into())
    }

    pub fn unreadable_body(msg: impl Into<String>) -> Self {
        TransportError::UnreadableBody(msg.into())
    }
}

/// Errors returned by `ApiClient` parse methods and controller operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never completed.
    #[error("backend unreachable: {0}")]
    NetworkUnavailable(TransportError),

    /// Non-2xx response whose body carried an `error` field.
    #[error("HTTP {status}: {reason}")]
    BackendRejected { status: u16, reason: String },

    /// Non-2xx response with no readable `error` field.
    #[error("HTTP {status}")]
    BackendRejectedNoReason { status: u16 },

    /// 2xx response whose body is not the expected JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// A backend that answered with an unreadable body was reachable, so that
/// case is a malformed response rather than a connectivity failure.
impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnreadableBody(msg) => ApiError::MalformedResponse(msg),
            unreachable => ApiError::NetworkUnavailable(unreachable),
        }
    }
}

impl ApiError {
    /// Reason supplied by the backend, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ApiError::BackendRejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// HTTP status of a rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BackendRejected { status, .. }
            | ApiError::BackendRejectedNoReason { status } => Some(*status),
            _ => None,
        }
    }
}
