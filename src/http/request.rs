//! Request-side helpers for the HTTP dispatcher.
//!
//! # Responsibilities
//! - Track the per-request stage for tracing
//! - Extract the request ID set by the transport layers
//! - Read the body within the configured limit
//!
//! # Design Decisions
//! - Request ID assigned as early as possible (outermost layer), so every
//!   log line of a request can carry it
//! - Body is buffered whole; decoders see a complete payload

use std::fmt;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName};
use bytes::Bytes;
use http_body_util::LengthLimitError;

use crate::error::{Error, Result};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Where a request is in the dispatch pipeline.
///
/// ```text
/// Received → Matched → Decoded → MiddlewareApplied → HandlerInvoked → Encoded → Responded
///     └──────────┴─────────┴────────────┴──────────────────┴──────────┴──→ Errored → Responded
/// ```
///
/// A trailing-slash redirect goes straight from `Matched` to `Responded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Matched,
    Decoded,
    MiddlewareApplied,
    HandlerInvoked,
    Encoded,
    Responded,
    Errored,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Matched => "matched",
            Stage::Decoded => "decoded",
            Stage::MiddlewareApplied => "middleware_applied",
            Stage::HandlerInvoked => "handler_invoked",
            Stage::Encoded => "encoded",
            Stage::Responded => "responded",
            Stage::Errored => "errored",
        }
    }

    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Responded, _) => false,
            (_, Errored) => self != Errored,
            (Errored, Responded) => true,
            // trailing-slash redirect
            (Matched, Responded) => true,
            (Received, Matched)
            | (Matched, Decoded)
            | (Decoded, MiddlewareApplied)
            | (MiddlewareApplied, HandlerInvoked)
            | (HandlerInvoked, Encoded)
            | (Encoded, Responded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage tracker for one request.
#[derive(Debug)]
pub struct RequestFlow {
    request_id: String,
    stage: Stage,
}

impl RequestFlow {
    pub fn new(request_id: String) -> Self {
        tracing::trace!(request_id = %request_id, stage = %Stage::Received, "HTTP request stage");
        Self {
            request_id,
            stage: Stage::Received,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {} -> {}",
            self.stage,
            next
        );
        tracing::trace!(request_id = %self.request_id, from = %self.stage, stage = %next, "HTTP request stage");
        self.stage = next;
    }

    /// Record a failure at the current stage.
    pub fn fail(&mut self, err: &Error) {
        let failed_at = self.stage;
        self.advance(Stage::Errored);
        if is_server_fault(err) {
            tracing::error!(request_id = %self.request_id, stage = %failed_at, error = %err, "Request failed");
        } else {
            tracing::debug!(request_id = %self.request_id, stage = %failed_at, error = %err, "Request rejected");
        }
    }
}

fn is_server_fault(err: &Error) -> bool {
    matches!(
        err,
        Error::Encoding(_)
            | Error::Handler {
                kind: crate::ErrorKind::Internal | crate::ErrorKind::Unknown,
                ..
            }
    )
}

/// The request ID from the `x-request-id` header, or a fresh UUID.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Buffer the body, failing with [`Error::PayloadTooLarge`] past `limit`.
///
/// Any other read failure (a reset stream, a malformed chunk) is the
/// client's fault and reported as [`Error::BadRequest`].
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "Request body rejected");
        if exceeds_limit(&e) {
            Error::PayloadTooLarge { limit }
        } else {
            Error::bad_request(format!("failed to read body: {e}"))
        }
    })
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = std::error::Error::source(err);
    }
    false
}
