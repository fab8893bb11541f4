//! Middleware chain for endpoint processing.
//!
//! # Data Flow
//! ```text
//! service_wide[0] → service_wide[1] → … → endpoint[0] → … → handler
//!                                                              │
//! service_wide[0] ← service_wide[1] ← … ← endpoint[0] ← … ←────┘
//! ```
//!
//! # Design Decisions
//! - A middleware is a function from endpoint to endpoint
//! - Chains are composed once at registration, never per request
//! - Service-wide middleware is outermost
//! - Middleware returns errors; only dispatchers write transport responses

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::Result;
use crate::service::{Context, Endpoint, Message};

/// Wraps an endpoint into another endpoint.
#[derive(Clone)]
pub struct Middleware {
    name: Arc<str>,
    wrap: Arc<dyn Fn(Endpoint) -> Endpoint + Send + Sync>,
}

impl Middleware {
    /// Create a middleware from an endpoint transformer.
    pub fn new<F>(name: impl Into<Arc<str>>, wrap: F) -> Self
    where
        F: Fn(Endpoint) -> Endpoint + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, inner: Endpoint) -> Endpoint {
        (self.wrap)(inner)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// The rest of the chain, as seen from inside a middleware.
pub struct Next {
    inner: Endpoint,
}

impl Next {
    /// Run the remaining middleware and the handler.
    pub async fn run(self, ctx: Context, request: Message) -> Result<Message> {
        self.inner.call(ctx, request).await
    }
}

/// Build a middleware from an async function.
///
/// The function can short-circuit by returning without calling `next.run`,
/// modify the context before passing it on, or post-process the response.
///
/// ```ignore
/// let auth = middleware::from_fn("auth", |ctx, req, next| async move {
///     if ctx.metadata().get("authorization").is_none() {
///         return Err(Error::unauthenticated("missing credentials"));
///     }
///     next.run(ctx, req).await
/// });
/// ```
pub fn from_fn<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Middleware
where
    F: Fn(Context, Message, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message>> + Send + 'static,
{
    let f = Arc::new(f);
    Middleware::new(name, move |inner: Endpoint| {
        let f = Arc::clone(&f);
        let next_endpoint = inner.clone();
        inner.wrap(Arc::new(
            move |ctx: Context, request: Message| -> BoxFuture<'static, Result<Message>> {
                let next = Next {
                    inner: next_endpoint.clone(),
                };
                Box::pin(f(ctx, request, next))
            },
        ))
    })
}

/// Compose `service_wide ∘ endpoint_specific ∘ handler`.
///
/// `service_wide[0]` ends up outermost, so it runs first on the way in and
/// last on the way out.
pub fn build(service_wide: &[Middleware], endpoint_specific: &[Middleware], handler: Endpoint) -> Endpoint {
    service_wide
        .iter()
        .chain(endpoint_specific)
        .rev()
        .fold(handler, |inner, middleware| middleware.apply(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::service::Transport;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &'static str, log: Log) -> Middleware {
        from_fn(name, move |ctx, req, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("enter {name}"));
                let out = next.run(ctx, req).await;
                log.lock().unwrap().push(format!("exit {name}"));
                out
            }
        })
    }

    fn handler(log: Log) -> Endpoint {
        Endpoint::from_fn(move |_ctx, req| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("handler".into());
                Ok::<_, Error>(req)
            }
        })
    }

    #[tokio::test]
    async fn service_wide_wraps_endpoint_specific() {
        let log: Log = Arc::default();
        let service_wide = [recording("A", log.clone()), recording("B", log.clone())];
        let endpoint_specific = [recording("C", log.clone())];

        let chain = build(&service_wide, &endpoint_specific, handler(log.clone()));
        chain
            .call(Context::new(Transport::Http, "GET /"), Message::new(()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter A", "enter B", "enter C", "handler", "exit C", "exit B", "exit A"]
        );
    }

    #[tokio::test]
    async fn order_is_stable_across_calls() {
        let log: Log = Arc::default();
        let chain = build(
            &[recording("A", log.clone())],
            &[recording("C", log.clone())],
            handler(log.clone()),
        );

        for _ in 0..3 {
            chain
                .call(Context::new(Transport::Rpc, "x/y"), Message::new(()))
                .await
                .unwrap();
        }
        let entries = log.lock().unwrap();
        assert_eq!(entries.len(), 15);
        assert!(entries.chunks(5).all(|c| c == ["enter A", "enter C", "handler", "exit C", "exit A"]));
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_layers() {
        let log: Log = Arc::default();
        let deny = from_fn("deny", |_ctx, _req, _next| async move {
            Err::<Message, _>(Error::unauthenticated("no token"))
        });

        let chain = build(&[deny], &[recording("C", log.clone())], handler(log.clone()));
        let err = chain
            .call(Context::new(Transport::Http, "GET /"), Message::new(()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Handler { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[derive(Clone)]
    struct Principal(&'static str);

    #[tokio::test]
    async fn middleware_augments_context() {
        let attach = from_fn("attach", |mut ctx: Context, req, next: Next| async move {
            ctx.insert(Principal("ada"));
            next.run(ctx, req).await
        });
        let read = Endpoint::from_fn(|ctx: Context, _req| async move {
            let who = ctx.get::<Principal>().map(|p| p.0).unwrap_or("nobody");
            Ok::<_, Error>(Message::new(who.to_string()))
        });

        let out = build(&[attach], &[], read)
            .call(Context::new(Transport::Http, "GET /me"), Message::new(()))
            .await
            .unwrap();
        assert_eq!(out.downcast::<String>().unwrap(), "ada");
    }

    #[tokio::test]
    async fn post_processing_sees_response() {
        let double = from_fn("double", |ctx, req, next| async move {
            let out = next.run(ctx, req).await?;
            let n = out.downcast::<u32>()?;
            Ok::<_, Error>(Message::new(n * 2))
        });
        let seven = Endpoint::from_fn(|_ctx, _req| async move { Ok::<_, Error>(Message::new(7u32)) });

        let out = build(&[], &[double], seven)
            .call(Context::new(Transport::Rpc, "n/seven"), Message::new(()))
            .await
            .unwrap();
        assert_eq!(out.downcast::<u32>().unwrap(), 14);
    }
}
