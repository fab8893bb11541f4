//! HTTP dispatcher and router setup.
//!
//! # Responsibilities
//! - Register the service's HTTP endpoint table (fail fast on conflicts)
//! - Compose each endpoint's middleware chain once, at registration
//! - Dispatch requests: match → decode → middleware/handler → encode
//! - Map every failure to a well-formed response through the route's policy
//! - Wire up transport layers (request ID, tracing, timeout, limits)

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{request::Parts, Request, StatusCode};
use axum::response::Response;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::codec::{json, HttpDecoder, HttpEncoder, HttpInput};
use crate::config::schema::HttpConfig;
use crate::error::{Error, Result};
use crate::http::options::{default_error_response, ResolvedOptions};
use crate::http::request::{read_body, request_id, RequestFlow, Stage};
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::middleware;
use crate::net::connection::{track_in_flight, RequestTracker};
use crate::observability::metrics;
use crate::routing::Router;
use crate::service::{Context, Endpoint, PathParams, ServiceDescriptor, Transport};

/// Operation label for requests that matched no route.
const UNMATCHED: &str = "unmatched";

/// A registered route, ready to serve.
struct HttpBinding {
    operation: Arc<str>,
    endpoint: Endpoint,
    decoder: HttpDecoder,
    encoder: HttpEncoder,
    options: ResolvedOptions,
}

/// Routes HTTP requests to the service's endpoints.
pub struct HttpDispatcher {
    router: Router<Arc<HttpBinding>>,
    fallback: ResolvedOptions,
    max_body_bytes: usize,
}

impl HttpDispatcher {
    /// Register every HTTP endpoint of `descriptor`.
    ///
    /// Fails on the first malformed pattern, duplicate `(path, method)` or
    /// endpoint without a usable decoder; nothing is served in that case.
    pub fn new(descriptor: &ServiceDescriptor, max_body_bytes: usize) -> Result<Self> {
        let mut router = Router::new(descriptor.router_config());

        for route in descriptor.http_routes() {
            let declared = &route.endpoint;
            let decoder = match &declared.decoder {
                Some(decoder) => decoder.clone(),
                None => json::http_decoder(&declared.endpoint).ok_or_else(|| Error::InvalidRoute {
                    pattern: route.path.clone(),
                    reason: format!("{} endpoint has no typed request; set a decoder", route.method),
                })?,
            };
            let encoder = declared.encoder.clone().unwrap_or_else(json::http_encoder);

            let binding = HttpBinding {
                operation: Arc::from(format!("{} {}", route.method, route.path)),
                endpoint: middleware::build(
                    descriptor.http_middleware(),
                    &declared.middleware,
                    declared.endpoint.clone(),
                ),
                decoder,
                encoder,
                options: ResolvedOptions::resolve(descriptor.http_options().iter().chain(&declared.options)),
            };
            router.register(&route.path, route.method.clone(), Arc::new(binding))?;
        }

        tracing::info!(
            service = %descriptor.name(),
            routes = router.len(),
            "HTTP endpoints registered"
        );

        Ok(Self {
            router,
            fallback: ResolvedOptions::resolve(descriptor.http_options()),
            max_body_bytes,
        })
    }

    /// Number of registered `(path, method)` pairs.
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Handle one request from start to response.
    pub async fn dispatch(&self, request: Request<Body>, shutdown: &ShutdownSignal) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let mut flow = RequestFlow::new(request_id(&parts.headers));

        let matched = match self.router.lookup(parts.uri.path(), &parts.method) {
            Ok(matched) => matched,
            Err(err) => {
                flow.fail(&err);
                let response = self.fallback.error_response(&err);
                return finish(flow, UNMATCHED, response, start);
            }
        };
        flow.advance(Stage::Matched);

        let binding = Arc::clone(matched.value);
        if let Some(canonical) = matched.redirect {
            let response = response::redirect(&canonical, &parts.uri);
            return finish(flow, &binding.operation, response, start);
        }

        let response = match self
            .run(&mut flow, &binding, parts, body, matched.params, shutdown)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                flow.fail(&err);
                binding.options.error_response(&err)
            }
        };
        finish(flow, &binding.operation, response, start)
    }

    async fn run(
        &self,
        flow: &mut RequestFlow,
        binding: &HttpBinding,
        parts: Parts,
        body: Body,
        params: PathParams,
        shutdown: &ShutdownSignal,
    ) -> Result<Response> {
        let body = read_body(body, self.max_body_bytes).await?;

        let mut ctx = Context::new(Transport::Http, Arc::clone(&binding.operation))
            .with_request_id(flow.request_id())
            .with_params(params)
            .with_metadata(parts.headers.clone())
            .with_shutdown(shutdown.clone());
        for hook in &binding.options.before {
            hook(&mut ctx, &parts);
        }

        let request = binding.decoder.decode(&HttpInput {
            method: &parts.method,
            uri: &parts.uri,
            headers: &parts.headers,
            params: ctx.params(),
            body: &body,
        })?;
        flow.advance(Stage::Decoded);

        // The chain was composed at registration; entering it is the only step left.
        flow.advance(Stage::MiddlewareApplied);
        let response = binding.endpoint.call(ctx, request).await?;
        flow.advance(Stage::HandlerInvoked);

        let encoded = binding.encoder.encode(response)?;
        flow.advance(Stage::Encoded);

        Ok(response::success(encoded, &binding.options))
    }
}

fn finish(mut flow: RequestFlow, operation: &str, response: Response, start: Instant) -> Response {
    flow.advance(Stage::Responded);
    let status = response.status();
    metrics::record_request(Transport::Http, operation, status.as_u16(), start);
    tracing::debug!(
        request_id = %flow.request_id(),
        operation = %operation,
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "HTTP request completed"
    );
    response
}

/// State injected into the fallback handler.
#[derive(Clone)]
struct HttpState {
    dispatcher: Arc<HttpDispatcher>,
    shutdown: ShutdownSignal,
}

async fn dispatch(State(state): State<HttpState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request, &state.shutdown).await
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked");
    default_error_response(&Error::internal("internal error"), StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build the Axum router with all middleware layers.
///
/// Every path goes to the dispatcher, which does its own matching.
#[allow(deprecated)]
pub fn build_router(
    dispatcher: Arc<HttpDispatcher>,
    config: &HttpConfig,
    shutdown: ShutdownSignal,
    tracker: RequestTracker,
) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .with_state(HttpState {
            dispatcher,
            shutdown,
        })
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(GlobalConcurrencyLimitLayer::new(config.max_concurrent_requests))
        .layer(axum::middleware::from_fn_with_state(tracker, track_in_flight))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoded;
    use crate::error::ErrorKind;
    use crate::http::HttpOption;
    use crate::routing::{RouterConfig, TrailingSlash};
    use crate::service::{HttpEndpoint, Message};
    use axum::http::{header, HeaderValue, Method};
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct GetCat {
        id: String,
    }

    #[derive(Debug, Serialize)]
    struct Cat {
        id: String,
        name: String,
    }

    fn get_cat(calls: Arc<AtomicUsize>) -> Endpoint {
        Endpoint::new(move |_ctx, req: GetCat| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if req.id == "0" {
                    return Err(Error::not_found("no cat 0"));
                }
                Ok(Cat {
                    id: req.id,
                    name: "Whiskers".into(),
                })
            }
        })
    }

    fn app(descriptor: ServiceDescriptor) -> axum::Router {
        let dispatcher = HttpDispatcher::new(&descriptor, 1024).unwrap();
        build_router(
            Arc::new(dispatcher),
            &HttpConfig::default(),
            ShutdownSignal::never(),
            RequestTracker::new(Transport::Http),
        )
    }

    async fn send(app: axum::Router, method: Method, uri: &str, body: &'static str) -> (StatusCode, Response) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn get_cat_by_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats/{id}", Method::GET, get_cat(calls.clone()))
            .build();

        let (status, response) = send(app(descriptor), Method::GET, "/cats/42", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, r#"{"id":"42","name":"Whiskers"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn path_params_are_decoded_and_typed() {
        #[derive(Deserialize)]
        struct Page {
            id: u64,
            page: u32,
        }

        let named = get_cat(Arc::default());
        let paged = Endpoint::new(|_ctx, req: Page| async move { Ok::<_, Error>(req.id * 10 + u64::from(req.page)) });
        let ping = Endpoint::new(|_ctx, _req: ()| async move { Ok::<_, Error>("pong") });
        let descriptor = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats/{id}", Method::GET, named)
            .http_endpoint("/owners/{id}/cats", Method::GET, paged)
            .http_endpoint("/ping", Method::GET, ping)
            .build();
        let app = app(descriptor);

        let (status, response) = send(app.clone(), Method::GET, "/cats/Mr%20Tibbs", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"id":"Mr Tibbs","name":"Whiskers"}"#);

        let (status, _) = send(app.clone(), Method::GET, "/cats/%FF", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, response) = send(app.clone(), Method::GET, "/owners/4/cats?page=2", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_string(response).await, "42");

        let (status, response) = send(app, Method::GET, "/ping", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_string(response).await, r#""pong""#);
    }

    #[tokio::test]
    async fn literal_route_wins() {
        let special = Endpoint::new(|_ctx, _req: serde_json::Value| async move {
            Ok::<_, Error>(serde_json::json!({"special": true}))
        });
        let descriptor = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats/{id}", Method::GET, get_cat(Arc::default()))
            .http_endpoint("/cats/special", Method::GET, special)
            .build();

        let (status, response) = send(app(descriptor), Method::GET, "/cats/special", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"special":true}"#);
    }

    #[tokio::test]
    async fn unmatched_route_skips_middleware() {
        let entered = Arc::new(AtomicUsize::new(0));
        let counter = entered.clone();
        let descriptor = ServiceDescriptor::builder("cats")
            .http_middleware(middleware::from_fn("count", move |ctx, req, next| {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run(ctx, req)
            }))
            .http_endpoint("/cats/{id}", Method::GET, get_cat(Arc::default()))
            .build();

        let app = app(descriptor);
        let (status, response) = send(app.clone(), Method::GET, "/dogs/1", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("error"));

        let (status, _) = send(app, Method::POST, "/cats/1", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(entered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats", Method::POST, get_cat(calls.clone()))
            .build();

        let (status, response) = send(app(descriptor), Method::POST, "/cats", "{\"id\": 4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("bad request"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_errors_follow_status_policy() {
        let descriptor = ServiceDescriptor::builder("cats")
            .http_option(HttpOption::ErrorStatus(ErrorKind::NotFound, StatusCode::GONE))
            .http_endpoint("/cats/{id}", Method::GET, get_cat(Arc::default()))
            .http_endpoint(
                "/v2/cats/{id}",
                Method::GET,
                HttpEndpoint::new(get_cat(Arc::default()))
                    .option(HttpOption::ErrorStatus(ErrorKind::NotFound, StatusCode::NOT_FOUND)),
            )
            .build();
        let app = app(descriptor);

        let (status, response) = send(app.clone(), Method::GET, "/cats/0", "").await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body_string(response).await, r#"{"error":"no cat 0"}"#);

        let (status, _) = send(app, Method::GET, "/v2/cats/0", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn middleware_order_over_http() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let step = |name: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
            middleware::from_fn(name, move |ctx, req, next| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name);
                    let out = next.run(ctx, req).await;
                    log.lock().unwrap().push(name);
                    out
                }
            })
        };
        let descriptor = ServiceDescriptor::builder("cats")
            .http_middleware(step("A", log.clone()))
            .http_middleware(step("B", log.clone()))
            .http_endpoint(
                "/cats/{id}",
                Method::GET,
                HttpEndpoint::new(get_cat(Arc::default())).middleware(step("C", log.clone())),
            )
            .build();

        let (status, _) = send(app(descriptor), Method::GET, "/cats/1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C", "C", "B", "A"]);
    }

    #[tokio::test]
    async fn custom_codec_and_options() {
        let echo = Endpoint::from_fn(|ctx: Context, req: Message| async move {
            let text = req.downcast::<String>()?;
            let caller = ctx.get::<String>().cloned().unwrap_or_default();
            Ok::<_, Error>(Message::new(format!("{caller}:{text}")))
        });
        let descriptor = ServiceDescriptor::builder("echo")
            .http_endpoint(
                "/echo",
                Method::POST,
                HttpEndpoint::new(echo)
                    .decoder(HttpDecoder::new(|input| {
                        String::from_utf8(input.body.to_vec()).map_err(|e| Error::bad_request(e.to_string()))
                    }))
                    .encoder(HttpEncoder::new(|text: String| Ok(Encoded::new("text/plain", text))))
                    .option(HttpOption::before(|ctx, parts| {
                        let caller = parts.headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok());
                        ctx.insert(caller.unwrap_or("anon").to_string());
                    }))
                    .option(HttpOption::SuccessStatus(StatusCode::ACCEPTED))
                    .option(HttpOption::ResponseHeader(
                        header::CACHE_CONTROL,
                        HeaderValue::from_static("no-store"),
                    )),
            )
            .build();

        let (status, response) = send(app(descriptor), Method::POST, "/echo", "hi").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(body_string(response).await, "anon:hi");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats", Method::POST, get_cat(calls.clone()))
            .build();

        let big: &'static str = Box::leak("x".repeat(4096).into_boxed_str());
        let (status, _) = send(app(descriptor), Method::POST, "/cats", big).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trailing_slash_redirect() {
        let descriptor = ServiceDescriptor::builder("cats")
            .router_config(RouterConfig::default().trailing_slash(TrailingSlash::Redirect))
            .http_endpoint("/cats/{id}", Method::GET, get_cat(Arc::default()))
            .build();

        let (status, response) = send(app(descriptor), Method::GET, "/cats/7/?v=1", "").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/cats/7?v=1");
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let boom = Endpoint::new(|_ctx, _req: serde_json::Value| async move {
            if true {
                panic!("boom");
            }
            Ok::<_, Error>(serde_json::Value::Null)
        });
        let descriptor = ServiceDescriptor::builder("boom")
            .http_endpoint("/boom", Method::GET, boom)
            .build();

        let (status, _) = send(app(descriptor), Method::GET, "/boom", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn registration_errors_are_fatal() {
        let duplicate = ServiceDescriptor::builder("cats")
            .http_endpoint("/cats/{id}", Method::GET, get_cat(Arc::default()))
            .http_endpoint("/cats/{name}", Method::GET, get_cat(Arc::default()))
            .build();
        assert!(matches!(
            HttpDispatcher::new(&duplicate, 1024),
            Err(Error::DuplicateBinding(_))
        ));

        let undecodable = ServiceDescriptor::builder("raw")
            .http_endpoint("/raw", Method::POST, Endpoint::from_fn(|_ctx, req| async move { Ok::<_, Error>(req) }))
            .build();
        assert!(matches!(
            HttpDispatcher::new(&undecodable, 1024),
            Err(Error::InvalidRoute { .. })
        ));
    }
}
