//! Per-service and per-endpoint HTTP options.
//!
//! # Design Decisions
//! - Options are an ordered list; later entries override earlier ones
//! - Service-wide options are applied first, endpoint options after them
//! - Options are resolved once per route at registration

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::{request::Parts, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{Error, ErrorKind};
use crate::service::Context;

pub type BeforeFn = Arc<dyn Fn(&mut Context, &Parts) + Send + Sync>;
pub type ErrorEncodeFn = Arc<dyn Fn(&Error, StatusCode) -> Response + Send + Sync>;

#[derive(Clone)]
pub enum HttpOption {
    /// Status used for handler errors of this kind.
    ErrorStatus(ErrorKind, StatusCode),
    /// Status used for successful responses (default `200 OK`).
    SuccessStatus(StatusCode),
    /// Header added to every response, success or error.
    ResponseHeader(HeaderName, HeaderValue),
    /// Hook that copies request data into the context before decoding.
    Before(BeforeFn),
    /// Replaces the default `{"error": "..."}` body.
    ErrorEncoder(ErrorEncodeFn),
}

impl HttpOption {
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&mut Context, &Parts) + Send + Sync + 'static,
    {
        Self::Before(Arc::new(f))
    }

    pub fn error_encoder<F>(f: F) -> Self
    where
        F: Fn(&Error, StatusCode) -> Response + Send + Sync + 'static,
    {
        Self::ErrorEncoder(Arc::new(f))
    }
}

impl fmt::Debug for HttpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorStatus(kind, status) => f.debug_tuple("ErrorStatus").field(kind).field(status).finish(),
            Self::SuccessStatus(status) => f.debug_tuple("SuccessStatus").field(status).finish(),
            Self::ResponseHeader(name, value) => f.debug_tuple("ResponseHeader").field(name).field(value).finish(),
            Self::Before(_) => f.write_str("Before(..)"),
            Self::ErrorEncoder(_) => f.write_str("ErrorEncoder(..)"),
        }
    }
}

/// Maps errors to HTTP status codes.
#[derive(Debug, Clone, Default)]
pub struct StatusPolicy {
    overrides: HashMap<ErrorKind, StatusCode>,
}

impl StatusPolicy {
    pub fn set(&mut self, kind: ErrorKind, status: StatusCode) {
        self.overrides.insert(kind, status);
    }

    pub fn status_for(&self, err: &Error) -> StatusCode {
        match err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Handler { kind, .. } => self
                .overrides
                .get(kind)
                .copied()
                .unwrap_or_else(|| default_status(*kind)),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Default status for a handler error kind.
pub fn default_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument | ErrorKind::FailedPrecondition | ErrorKind::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::Aborted => StatusCode::CONFLICT,
        ErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        // Client closed request; not in `http`'s constant set.
        ErrorKind::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        ErrorKind::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Unknown | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Options resolved for one route.
#[derive(Clone, Default)]
pub struct ResolvedOptions {
    pub statuses: StatusPolicy,
    pub success: Option<StatusCode>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub before: Vec<BeforeFn>,
    pub error_encoder: Option<ErrorEncodeFn>,
}

impl ResolvedOptions {
    /// Fold service-wide then endpoint options into one set.
    pub fn resolve<'a>(options: impl IntoIterator<Item = &'a HttpOption>) -> Self {
        let mut resolved = Self::default();
        for option in options {
            match option {
                HttpOption::ErrorStatus(kind, status) => resolved.statuses.set(*kind, *status),
                HttpOption::SuccessStatus(status) => resolved.success = Some(*status),
                HttpOption::ResponseHeader(name, value) => {
                    resolved.headers.retain(|(existing, _)| existing != name);
                    resolved.headers.push((name.clone(), value.clone()));
                }
                HttpOption::Before(hook) => resolved.before.push(Arc::clone(hook)),
                HttpOption::ErrorEncoder(encode) => resolved.error_encoder = Some(Arc::clone(encode)),
            }
        }
        resolved
    }

    pub fn success_status(&self) -> StatusCode {
        self.success.unwrap_or(StatusCode::OK)
    }

    /// Render an error with this route's policy and encoder.
    pub fn error_response(&self, err: &Error) -> Response {
        let status = self.statuses.status_for(err);
        let mut response = match &self.error_encoder {
            Some(encode) => encode(err, status),
            None => default_error_response(err, status),
        };
        self.apply_headers(&mut response);
        response
    }

    pub fn apply_headers(&self, response: &mut Response) {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("statuses", &self.statuses)
            .field("success", &self.success)
            .field("headers", &self.headers)
            .field("before", &self.before.len())
            .field("error_encoder", &self.error_encoder.is_some())
            .finish()
    }
}

/// `{"error": "<message>"}` with the given status.
pub fn default_error_response(err: &Error, status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "error": err.public_message() }))).into_response()
}
