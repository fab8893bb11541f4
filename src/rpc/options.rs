//! Per-service and per-method RPC options, and the error → status mapping.

use std::collections::HashMap;

use tonic::{Code, Status};

use crate::error::{Error, ErrorKind};

/// Default message size limit in both directions (4 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcOption {
    /// Largest request message accepted.
    MaxRecvMessageSize(usize),
    /// Largest response message sent.
    MaxSendMessageSize(usize),
    /// Code used for handler errors of this kind.
    ErrorCode(ErrorKind, Code),
}

/// Canonical code for a handler error kind.
pub fn default_code(kind: ErrorKind) -> Code {
    match kind {
        ErrorKind::Cancelled => Code::Cancelled,
        ErrorKind::Unknown => Code::Unknown,
        ErrorKind::InvalidArgument => Code::InvalidArgument,
        ErrorKind::DeadlineExceeded => Code::DeadlineExceeded,
        ErrorKind::NotFound => Code::NotFound,
        ErrorKind::AlreadyExists => Code::AlreadyExists,
        ErrorKind::PermissionDenied => Code::PermissionDenied,
        ErrorKind::ResourceExhausted => Code::ResourceExhausted,
        ErrorKind::FailedPrecondition => Code::FailedPrecondition,
        ErrorKind::Aborted => Code::Aborted,
        ErrorKind::OutOfRange => Code::OutOfRange,
        ErrorKind::Unimplemented => Code::Unimplemented,
        ErrorKind::Internal => Code::Internal,
        ErrorKind::Unavailable => Code::Unavailable,
        ErrorKind::Unauthenticated => Code::Unauthenticated,
    }
}

/// Options resolved for one method. Later options win.
#[derive(Debug, Clone)]
pub struct ResolvedRpcOptions {
    pub max_recv: usize,
    pub max_send: usize,
    codes: HashMap<ErrorKind, Code>,
}

impl ResolvedRpcOptions {
    /// Start from the host limit, then apply service-wide and method options.
    pub fn resolve<'a>(default_limit: usize, options: impl IntoIterator<Item = &'a RpcOption>) -> Self {
        let mut resolved = Self {
            max_recv: default_limit,
            max_send: default_limit,
            codes: HashMap::new(),
        };
        for option in options {
            match *option {
                RpcOption::MaxRecvMessageSize(limit) => resolved.max_recv = limit,
                RpcOption::MaxSendMessageSize(limit) => resolved.max_send = limit,
                RpcOption::ErrorCode(kind, code) => {
                    resolved.codes.insert(kind, code);
                }
            }
        }
        resolved
    }

    pub fn code_for(&self, err: &Error) -> Code {
        match err {
            // An unmatched method name, not a missing resource.
            Error::NotFound(_) => Code::Unimplemented,
            Error::BadRequest(_) => Code::InvalidArgument,
            Error::PayloadTooLarge { .. } => Code::ResourceExhausted,
            Error::Handler { kind, .. } => self.codes.get(kind).copied().unwrap_or_else(|| default_code(*kind)),
            _ => Code::Internal,
        }
    }

    pub fn status_for(&self, err: &Error) -> Status {
        Status::new(self.code_for(err), err.public_message())
    }
}
