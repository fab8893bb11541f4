//! RPC dispatcher and router setup.
//!
//! # Responsibilities
//! - Register the service's RPC method table under `{service}/{method}`
//! - Hand each call to tonic's unary server, which owns gRPC framing and
//!   status trailers
//! - Run the interceptor chain and handler, or map the failure to a status
//!
//! # Data Flow
//! ```text
//! POST /{service}/{method}
//!     → lookup (exact name; unknown → UNIMPLEMENTED)
//!     → read body (≤ max_recv + message prefix)
//!     → tonic::server::Grpc::unary
//!         → MessageCodec (payload → request message)
//!         → MethodCall → middleware chain → handler → encoder (≤ max_send)
//!     → 200 + message + grpc-status trailers, or a trailers-only error
//! ```
//!
//! # Design Decisions
//! - The body is buffered against the method's own limit before tonic sees
//!   it, so an oversized request is RESOURCE_EXHAUSTED rather than tonic's
//!   OUT_OF_RANGE
//! - `grpc-timeout` bounds the handler; expiry drops the handler future

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use tonic::server::{Grpc, UnaryService};
use tonic::{Code, Status};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::codec::{json, RpcDecoder, RpcEncoder};
use crate::config::schema::RpcConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::http::request::{read_body, request_id};
use crate::lifecycle::ShutdownSignal;
use crate::middleware;
use crate::net::connection::{track_in_flight, RequestTracker};
use crate::observability::metrics;
use crate::rpc::codec::MessageCodec;
use crate::rpc::options::ResolvedRpcOptions;
use crate::rpc::registry::MethodRegistry;
use crate::service::{Context, Endpoint, Message, ServiceDescriptor, Transport};

pub const GRPC_TIMEOUT: HeaderName = HeaderName::from_static("grpc-timeout");

/// Compression flag plus big-endian length in front of every message.
const MESSAGE_PREFIX_LEN: usize = 5;

struct RpcBinding {
    name: Arc<str>,
    endpoint: Endpoint,
    decoder: RpcDecoder,
    encoder: RpcEncoder,
    options: Arc<ResolvedRpcOptions>,
}

impl RpcBinding {
    /// Map a failed call to its status, logging server faults.
    fn reject(&self, err: &Error) -> Status {
        let status = self.options.status_for(err);
        match status.code() {
            Code::Internal | Code::Unknown => {
                tracing::error!(method = %self.name, error = %err, "RPC call failed");
            }
            code => {
                tracing::debug!(method = %self.name, error = %err, code = ?code, "RPC call rejected");
            }
        }
        status
    }

    async fn call(
        &self,
        request: tonic::Request<Message>,
        deadline: Option<Duration>,
        shutdown: ShutdownSignal,
    ) -> Result<Bytes> {
        let (metadata, _extensions, message) = request.into_parts();
        let metadata = metadata.into_headers();

        let ctx = Context::new(Transport::Rpc, Arc::clone(&self.name))
            .with_request_id(request_id(&metadata))
            .with_metadata(metadata)
            .with_shutdown(shutdown);

        let call = self.endpoint.call(ctx, message);
        let response = match deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| Error::handler(ErrorKind::DeadlineExceeded, "deadline exceeded"))??,
            None => call.await?,
        };

        let payload = self.encoder.encode(response)?;
        if payload.len() > self.options.max_send {
            return Err(Error::PayloadTooLarge {
                limit: self.options.max_send,
            });
        }
        Ok(payload)
    }
}

/// One unary call, as tonic's server drives it.
struct MethodCall {
    binding: Arc<RpcBinding>,
    deadline: Option<Duration>,
    shutdown: ShutdownSignal,
}

impl UnaryService<Message> for MethodCall {
    type Response = Bytes;
    type Future = BoxFuture<'static, std::result::Result<tonic::Response<Bytes>, Status>>;

    fn call(&mut self, request: tonic::Request<Message>) -> Self::Future {
        let binding = Arc::clone(&self.binding);
        let deadline = self.deadline;
        let shutdown = self.shutdown.clone();
        Box::pin(async move {
            binding
                .call(request, deadline, shutdown)
                .await
                .map(tonic::Response::new)
                .map_err(|err| binding.reject(&err))
        })
    }
}

/// Routes RPC calls to the service's methods.
pub struct RpcDispatcher {
    methods: MethodRegistry<Arc<RpcBinding>>,
    fallback: ResolvedRpcOptions,
}

impl RpcDispatcher {
    /// Register every RPC method of `descriptor`.
    pub fn new(descriptor: &ServiceDescriptor, max_message_bytes: usize) -> Result<Self> {
        let mut methods = MethodRegistry::new();

        for (method, declared) in descriptor.rpc_methods() {
            let name = descriptor.full_method_name(method);
            let decoder = match &declared.decoder {
                Some(decoder) => decoder.clone(),
                None => json::rpc_decoder(&declared.endpoint).ok_or_else(|| Error::InvalidRoute {
                    pattern: name.clone(),
                    reason: "handler has no typed request; set a decoder".into(),
                })?,
            };
            let binding = RpcBinding {
                name: Arc::from(name.as_str()),
                endpoint: middleware::build(
                    descriptor.rpc_middleware(),
                    &declared.middleware,
                    declared.endpoint.clone(),
                ),
                decoder,
                encoder: declared.encoder.clone().unwrap_or_else(json::rpc_encoder),
                options: Arc::new(ResolvedRpcOptions::resolve(
                    max_message_bytes,
                    descriptor.rpc_options().iter().chain(&declared.options),
                )),
            };
            methods.register(name, Arc::new(binding))?;
        }

        tracing::info!(
            service = %descriptor.rpc_service(),
            methods = methods.len(),
            "RPC methods registered"
        );

        Ok(Self {
            methods,
            fallback: ResolvedRpcOptions::resolve(max_message_bytes, descriptor.rpc_options()),
        })
    }

    /// Handle one call addressed to `/{service}/{method}`.
    ///
    /// Failures become trailers-only responses carrying the status in headers.
    pub async fn dispatch(&self, request: Request<Body>, shutdown: &ShutdownSignal) -> Response {
        let method = request.uri().path().trim_start_matches('/');
        let binding = match self.methods.lookup(method) {
            Ok(binding) => Arc::clone(binding),
            Err(err) => {
                tracing::debug!(method = %method, "Unknown RPC method");
                return status_response(self.fallback.status_for(&err));
            }
        };

        let deadline = request
            .headers()
            .get(GRPC_TIMEOUT)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_timeout);

        let (parts, body) = request.into_parts();
        let limit = binding.options.max_recv;
        let body = match read_body(body, limit.saturating_add(MESSAGE_PREFIX_LEN)).await {
            Ok(body) => body,
            Err(err) => return status_response(binding.reject(&err)),
        };

        let codec = MessageCodec::new(binding.decoder.clone(), Arc::clone(&binding.options));
        let mut grpc = Grpc::new(codec).max_decoding_message_size(limit);
        let call = MethodCall {
            binding,
            deadline,
            shutdown: shutdown.clone(),
        };
        grpc.unary(call, Request::from_parts(parts, Body::from(body)))
            .await
            .map(Body::new)
    }

    fn is_registered(&self, method: &str) -> bool {
        self.methods.lookup(method).is_ok()
    }
}

/// Parse a `grpc-timeout` value: up to 8 digits and a unit (`H M S m u n`).
pub fn parse_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount.saturating_mul(3600))),
        "M" => Some(Duration::from_secs(amount.saturating_mul(60))),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

fn status_response(status: Status) -> Response {
    let response: axum::http::Response<tonic::body::Body> = status.into_http();
    response.map(Body::new)
}

/// Status of a finished call. Trailers-only responses carry it in headers;
/// anything else completed the handler.
fn response_code(response: &Response) -> Code {
    Status::from_header_map(response.headers()).map_or(Code::Ok, |status| status.code())
}

#[derive(Clone)]
struct RpcState {
    dispatcher: Arc<RpcDispatcher>,
    shutdown: ShutdownSignal,
}

async fn dispatch(State(state): State<RpcState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    if request.method() != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let method = request.uri().path().trim_start_matches('/').to_string();
    let response = state.dispatcher.dispatch(request, &state.shutdown).await;

    let code = response_code(&response);
    let operation = if state.dispatcher.is_registered(&method) {
        method.as_str()
    } else {
        "unmatched"
    };
    metrics::record_request(Transport::Rpc, operation, code as u16, start);
    tracing::debug!(
        method = %method,
        code = ?code,
        duration_ms = start.elapsed().as_millis() as u64,
        "RPC call completed"
    );

    response
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("RPC handler panicked");
    status_response(Status::internal("internal error"))
}

/// Build the Axum router serving `POST /{service}/{method}`.
pub fn build_router(
    dispatcher: Arc<RpcDispatcher>,
    config: &RpcConfig,
    shutdown: ShutdownSignal,
    tracker: RequestTracker,
) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .with_state(RpcState {
            dispatcher,
            shutdown,
        })
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(GlobalConcurrencyLimitLayer::new(config.max_concurrent_requests))
        .layer(axum::middleware::from_fn_with_state(tracker, track_in_flight))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
