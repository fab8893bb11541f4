//! Error taxonomy shared by registration, dispatch and lifecycle.
//!
//! # Design Decisions
//! - One enum for the whole core; dispatchers translate it to transport
//!   statuses, nothing below them writes to a transport
//! - Handler failures carry an [`ErrorKind`] so status mapping is a policy
//!   decision, not something each handler hard-codes
//! - Registration and startup errors are fatal; per-request errors stay
//!   inside their request

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::service::Transport;

/// Classification of a business-logic failure.
///
/// Mirrors the gRPC canonical codes so both transports can map it without
/// losing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out_of_range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the service core.
#[derive(Debug, Error)]
pub enum Error {
    /// A (path, method) pair or RPC method name was registered twice.
    #[error("duplicate binding: {0}")]
    DuplicateBinding(String),

    /// A route pattern could not be parsed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRoute { pattern: String, reason: String },

    /// No binding matches the request.
    #[error("no binding for {0}")]
    NotFound(String),

    /// The request payload could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body or message exceeds the configured limit.
    #[error("payload exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Business logic failed.
    #[error("{kind}: {message}")]
    Handler { kind: ErrorKind, message: String },

    /// The response could not be serialized after the handler succeeded.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// A listener could not be started.
    #[error("failed to bind {transport} listener on {address}: {source}")]
    Bind {
        transport: Transport,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// In-flight requests were still running when the grace period ended.
    #[error("shutdown grace period of {grace:?} exceeded, {abandoned} request(s) abandoned")]
    ShutdownTimeout { grace: Duration, abandoned: u64 },

    /// A lifecycle operation was attempted from the wrong state.
    #[error("cannot {operation} while host is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::lifecycle::HostState,
    },
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a business-logic error of the given kind.
    pub fn handler(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Handler {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::handler(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::handler(ErrorKind::NotFound, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::handler(ErrorKind::Unauthenticated, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::handler(ErrorKind::PermissionDenied, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::handler(ErrorKind::Internal, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Short machine-readable label, used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DuplicateBinding(_) => "duplicate_binding",
            Self::InvalidRoute { .. } => "invalid_route",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Handler { kind, .. } => kind.as_str(),
            Self::Encoding(_) => "encoding",
            Self::Bind { .. } => "bind",
            Self::ShutdownTimeout { .. } => "shutdown_timeout",
            Self::InvalidState { .. } => "invalid_state",
        }
    }

    /// The message shown to clients.
    ///
    /// Encoding failures are server faults, so their details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Handler { message, .. } => message.clone(),
            Self::Encoding(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_display_includes_kind() {
        let err = Error::not_found("cat 7 does not exist");
        assert_eq!(err.to_string(), "not_found: cat 7 does not exist");
        assert_eq!(err.label(), "not_found");
    }

    #[test]
    fn encoding_details_are_not_public() {
        let err = Error::Encoding("map key must be a string".into());
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.label(), "encoding");
    }
}
