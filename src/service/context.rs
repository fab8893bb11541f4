//! Per-request context handed to middleware and endpoints.

use std::fmt;
use std::sync::Arc;

use axum::http::{Extensions, HeaderMap};

use crate::lifecycle::ShutdownSignal;

/// Transport a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Http,
    Rpc,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Rpc => "rpc",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named values captured from parameterized path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Request-scoped data.
///
/// Middleware may add typed values through [`Context::insert`] before calling
/// the next layer; endpoints read them back with [`Context::get`].
#[derive(Clone)]
pub struct Context {
    request_id: Arc<str>,
    transport: Transport,
    operation: Arc<str>,
    params: PathParams,
    metadata: HeaderMap,
    extensions: Extensions,
    shutdown: ShutdownSignal,
}

impl Context {
    /// Create a context for a request on `transport` targeting `operation`.
    pub fn new(transport: Transport, operation: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: Arc::from(uuid::Uuid::new_v4().to_string()),
            transport,
            operation: operation.into(),
            params: PathParams::new(),
            metadata: HeaderMap::new(),
            extensions: Extensions::new(),
            shutdown: ShutdownSignal::never(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<Arc<str>>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_metadata(mut self, metadata: HeaderMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// `"GET /cats/{id}"` for HTTP, `"pkg.Cats/GetCat"` for RPC.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Request headers (HTTP) or call metadata (RPC).
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Whether the host has started draining.
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Resolve once the host starts draining.
    pub async fn cancelled(&self) {
        self.shutdown.triggered().await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("transport", &self.transport)
            .field("operation", &self.operation)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
