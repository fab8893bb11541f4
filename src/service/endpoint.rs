//! Transport-independent business-logic units.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::service::{Context, Message};

type CallFn = dyn Fn(Context, Message) -> BoxFuture<'static, Result<Message>> + Send + Sync;
type JsonDecodeFn = fn(serde_json::Value) -> serde_json::Result<Message>;

/// A callable endpoint: `(Context, Message) → Result<Message>`.
///
/// Cloning is cheap; the same endpoint can be bound on HTTP and RPC through
/// different decoders and encoders.
#[derive(Clone)]
pub struct Endpoint {
    call: Arc<CallFn>,
    decode_json: Option<JsonDecodeFn>,
}

impl Endpoint {
    /// Build an endpoint from a typed async function.
    ///
    /// The request type gets a default JSON decoder and the response a default
    /// JSON encoder; bindings without custom codecs use those.
    pub fn new<Req, Resp, F, Fut>(handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let call = move |ctx: Context, request: Message| -> BoxFuture<'static, Result<Message>> {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let request = request.downcast::<Req>()?;
                let response = handler(ctx, request).await?;
                Ok::<_, crate::error::Error>(Message::serializable(response))
            })
        };
        Self {
            call: Arc::new(call),
            decode_json: Some(decode_json::<Req>),
        }
    }

    /// Build an endpoint that works on erased messages directly.
    ///
    /// It has no default request decoding; bindings must supply a decoder.
    pub fn from_fn<F, Fut>(handler: F) -> Self
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message>> + Send + 'static,
    {
        let call = move |ctx: Context, request: Message| -> BoxFuture<'static, Result<Message>> {
            Box::pin(handler(ctx, request))
        };
        Self {
            call: Arc::new(call),
            decode_json: None,
        }
    }

    /// Invoke the endpoint.
    pub fn call(&self, ctx: Context, request: Message) -> BoxFuture<'static, Result<Message>> {
        (self.call)(ctx, request)
    }

    /// Replace the call function, keeping the request decoding of `self`.
    ///
    /// Used by middleware: the wrapped endpoint still decodes the same request type.
    pub(crate) fn wrap(&self, call: Arc<CallFn>) -> Self {
        Self {
            call,
            decode_json: self.decode_json,
        }
    }

    /// Decode the request type from a JSON value, if this endpoint knows it.
    pub(crate) fn json_decoder(&self) -> Option<JsonDecodeFn> {
        self.decode_json
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("json_request", &self.decode_json.is_some())
            .finish_non_exhaustive()
    }
}

fn decode_json<Req: DeserializeOwned + Send + 'static>(
    value: serde_json::Value,
) -> serde_json::Result<Message> {
    serde_json::from_value::<Req>(value).map(Message::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Transport;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct Sum {
        sum: i64,
    }

    #[tokio::test]
    async fn typed_endpoint_round_trip() {
        let endpoint = Endpoint::new(|_ctx, req: Add| async move {
            Ok::<_, crate::Error>(Sum { sum: req.a + req.b })
        });

        let decode = endpoint.json_decoder().unwrap();
        let request = decode(serde_json::json!({"a": 2, "b": 3})).unwrap();
        let response = endpoint
            .call(Context::new(Transport::Rpc, "math.Calc/Add"), request)
            .await
            .unwrap();
        assert_eq!(response.to_json().unwrap(), br#"{"sum":5}"#.to_vec());
    }

    #[tokio::test]
    async fn erased_endpoint_has_no_json_decoder() {
        let endpoint = Endpoint::from_fn(|_ctx, req: Message| async move { Ok::<_, crate::Error>(req) });
        assert!(endpoint.json_decoder().is_none());

        let out = endpoint
            .call(Context::new(Transport::Http, "POST /echo"), Message::new(9u8))
            .await
            .unwrap();
        assert_eq!(out.downcast::<u8>().unwrap(), 9);
    }
}
