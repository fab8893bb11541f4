//! Codec layer: raw transport payloads ⇄ typed messages.
//!
//! # Responsibilities
//! - Decode an HTTP request (parts, path parameters, body) into a request message
//! - Decode an RPC payload into a request message
//! - Encode response messages back into bytes for either transport
//!
//! # Design Decisions
//! - Decoders and encoders are plain closures, set per binding
//! - A binding without a custom codec falls back to [`json`]; the fallback is
//!   resolved at registration, so a missing codec is a startup error
//! - Decoding failures are client errors, encoding failures are server errors

pub mod json;

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::service::{Message, PathParams};

/// Everything an HTTP decoder can look at.
#[derive(Debug)]
pub struct HttpInput<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub params: &'a PathParams,
    pub body: &'a Bytes,
}

impl HttpInput<'_> {
    /// Decoded query-string pairs, in order of appearance.
    pub fn query_pairs(&self) -> Result<Vec<(String, String)>> {
        if self.uri.query().is_none() {
            return Ok(Vec::new());
        }
        axum::extract::Query::<Vec<(String, String)>>::try_from_uri(self.uri)
            .map(|query| query.0)
            .map_err(|e| Error::BadRequest(format!("invalid query string: {e}")))
    }
}

/// An encoded HTTP response body.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub content_type: HeaderValue,
    pub body: Bytes,
}

impl Encoded {
    pub fn new(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: HeaderValue::from_static(content_type),
            body: body.into(),
        }
    }
}

/// Turns an HTTP request into a request message.
#[derive(Clone)]
pub struct HttpDecoder(Arc<dyn Fn(&HttpInput<'_>) -> Result<Message> + Send + Sync>);

impl HttpDecoder {
    /// Wrap a typed decoding function.
    ///
    /// Return [`Error::BadRequest`] for malformed input.
    pub fn new<T, F>(decode: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&HttpInput<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self(Arc::new(move |input| decode(input).map(Message::new)))
    }

    pub(crate) fn from_message_fn<F>(decode: F) -> Self
    where
        F: Fn(&HttpInput<'_>) -> Result<Message> + Send + Sync + 'static,
    {
        Self(Arc::new(decode))
    }

    pub fn decode(&self, input: &HttpInput<'_>) -> Result<Message> {
        (self.0)(input)
    }
}

/// Turns a response message into an HTTP body.
#[derive(Clone)]
pub struct HttpEncoder(Arc<dyn Fn(Message) -> Result<Encoded> + Send + Sync>);

impl HttpEncoder {
    /// Wrap a typed encoding function.
    pub fn new<T, F>(encode: F) -> Self
    where
        T: 'static,
        F: Fn(T) -> Result<Encoded> + Send + Sync + 'static,
    {
        Self(Arc::new(move |message: Message| {
            let value = message.downcast::<T>().map_err(into_encoding)?;
            encode(value)
        }))
    }

    pub(crate) fn from_message_fn<F>(encode: F) -> Self
    where
        F: Fn(Message) -> Result<Encoded> + Send + Sync + 'static,
    {
        Self(Arc::new(encode))
    }

    pub fn encode(&self, message: Message) -> Result<Encoded> {
        (self.0)(message)
    }
}

/// Turns an RPC payload into a request message.
#[derive(Clone)]
pub struct RpcDecoder(Arc<dyn Fn(&[u8]) -> Result<Message> + Send + Sync>);

impl RpcDecoder {
    pub fn new<T, F>(decode: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        Self(Arc::new(move |payload| decode(payload).map(Message::new)))
    }

    pub(crate) fn from_message_fn<F>(decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Message> + Send + Sync + 'static,
    {
        Self(Arc::new(decode))
    }

    pub fn decode(&self, payload: &[u8]) -> Result<Message> {
        (self.0)(payload)
    }
}

/// Turns a response message into an RPC payload.
#[derive(Clone)]
pub struct RpcEncoder(Arc<dyn Fn(Message) -> Result<Bytes> + Send + Sync>);

impl RpcEncoder {
    pub fn new<T, F>(encode: F) -> Self
    where
        T: 'static,
        F: Fn(T) -> Result<Bytes> + Send + Sync + 'static,
    {
        Self(Arc::new(move |message: Message| {
            let value = message.downcast::<T>().map_err(into_encoding)?;
            encode(value)
        }))
    }

    pub(crate) fn from_message_fn<F>(encode: F) -> Self
    where
        F: Fn(Message) -> Result<Bytes> + Send + Sync + 'static,
    {
        Self(Arc::new(encode))
    }

    pub fn encode(&self, message: Message) -> Result<Bytes> {
        (self.0)(message)
    }
}

macro_rules! opaque_debug {
    ($($ty:ident),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(stringify!($ty))
            }
        })*
    };
}

opaque_debug!(HttpDecoder, HttpEncoder, RpcDecoder, RpcEncoder);

/// A response of the wrong type reaching an encoder happens after the handler
/// ran, so it is reported as an encoding fault.
fn into_encoding(err: Error) -> Error {
    match err {
        Error::Handler { message, .. } => Error::Encoding(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_are_percent_decoded() {
        let uri: Uri = "/cats?name=Mr%20Tibbs&tag=a&tag=b".parse().unwrap();
        let input = HttpInput {
            method: &Method::GET,
            uri: &uri,
            headers: &HeaderMap::new(),
            params: &PathParams::new(),
            body: &Bytes::new(),
        };
        assert_eq!(
            input.query_pairs().unwrap(),
            vec![
                ("name".to_string(), "Mr Tibbs".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn typed_encoder_rejects_wrong_message() {
        let encoder = HttpEncoder::new(|n: u32| Ok(Encoded::new("text/plain", n.to_string())));
        assert_eq!(encoder.encode(Message::new(5u32)).unwrap().body, Bytes::from("5"));
        assert!(matches!(encoder.encode(Message::new("five")), Err(Error::Encoding(_))));
    }
}
