//! Default JSON codec.
//!
//! Used for every binding that does not set its own decoder or encoder.
//!
//! HTTP requests are decoded from one JSON object assembled from, in order of
//! increasing precedence:
//! 1. the body, when it is a JSON object
//! 2. query-string pairs
//! 3. path parameters
//!
//! so `GET /cats/42` against `/cats/{id}` deserializes `{"id": "42"}`. A body
//! that is not an object is deserialized as-is when there is nothing to merge.
//!
//! Query and path values arrive as strings. When the request type rejects
//! them, decoding is retried once with numeric and boolean strings turned
//! into JSON numbers and booleans, so `id: u64` fields work from the path.
//! A request with nothing in it decodes as `{}`, or as `null` for unit
//! request types.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::codec::{Encoded, HttpDecoder, HttpEncoder, HttpInput, RpcDecoder, RpcEncoder};
use crate::error::{Error, Result};
use crate::service::Endpoint;

pub const CONTENT_TYPE: &str = "application/json";

/// Request decoder for `endpoint`, or `None` when it has no typed request.
pub fn http_decoder(endpoint: &Endpoint) -> Option<HttpDecoder> {
    let decode = endpoint.json_decoder()?;
    Some(HttpDecoder::from_message_fn(move |input| {
        let err = match decode(request_value(input, Scalars::Strings)?) {
            Ok(message) => return Ok(message),
            Err(err) => err,
        };

        let retry = if !input.params.is_empty() || input.uri.query().is_some() {
            request_value(input, Scalars::Typed)?
        } else if input.body.is_empty() {
            Value::Null
        } else {
            return Err(Error::bad_request(format!("invalid request: {err}")));
        };
        decode(retry).map_err(|_| Error::bad_request(format!("invalid request: {err}")))
    }))
}

pub fn http_encoder() -> HttpEncoder {
    HttpEncoder::from_message_fn(|message| Ok(Encoded::new(CONTENT_TYPE, message.to_json()?)))
}

/// RPC payload decoder for `endpoint`. An empty payload decodes as `{}`, or
/// as `null` when the request type is unit.
pub fn rpc_decoder(endpoint: &Endpoint) -> Option<RpcDecoder> {
    let decode = endpoint.json_decoder()?;
    Some(RpcDecoder::from_message_fn(move |payload| {
        if payload.is_empty() {
            return decode(Value::Object(Map::new()))
                .or_else(|err| decode(Value::Null).map_err(|_| err))
                .map_err(|e| Error::bad_request(format!("invalid request: {e}")));
        }
        let value = serde_json::from_slice(payload)
            .map_err(|e| Error::bad_request(format!("invalid JSON message: {e}")))?;
        decode(value).map_err(|e| Error::bad_request(format!("invalid request: {e}")))
    }))
}

pub fn rpc_encoder() -> RpcEncoder {
    RpcEncoder::from_message_fn(|message| Ok(Bytes::from(message.to_json()?)))
}

/// How query and path values enter the request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalars {
    Strings,
    Typed,
}

impl Scalars {
    fn value(self, raw: &str) -> Value {
        if self == Scalars::Typed {
            if let Ok(value @ (Value::Number(_) | Value::Bool(_))) = serde_json::from_str(raw) {
                return value;
            }
        }
        Value::String(raw.to_string())
    }
}

fn request_value(input: &HttpInput<'_>, scalars: Scalars) -> Result<Value> {
    let query = input.query_pairs()?;

    let mut fields = Map::new();
    if !input.body.is_empty() {
        let body: Value = serde_json::from_slice(input.body)
            .map_err(|e| Error::bad_request(format!("invalid JSON body: {e}")))?;
        match body {
            Value::Object(map) => fields = map,
            other if query.is_empty() && input.params.is_empty() => return Ok(other),
            _ => {
                return Err(Error::bad_request(
                    "request body must be a JSON object when the route has parameters",
                ))
            }
        }
    }

    for (name, value) in query {
        fields.insert(name, scalars.value(&value));
    }
    for (name, value) in input.params.iter() {
        fields.insert(name.to_string(), scalars.value(value));
    }
    Ok(Value::Object(fields))
}
