//! Type-erased request and response values.

use std::any::{Any, TypeId};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

type JsonFn = fn(&(dyn Any + Send)) -> serde_json::Result<Vec<u8>>;

/// A request or response travelling through the middleware chain.
///
/// Decoders produce messages, endpoints consume and produce them, encoders
/// consume them. A message built with [`Message::serializable`] remembers how
/// to render itself as JSON, which is what the default encoder relies on.
pub struct Message {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    to_json: Option<JsonFn>,
}

impl Message {
    /// Wrap a value that has no default encoding.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
            to_json: None,
        }
    }

    /// Wrap a value that the default JSON encoder can render.
    pub fn serializable<T: Serialize + Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
            to_json: Some(json_bytes::<T>),
        }
    }

    /// Name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        (*self.value).type_id() == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Take the wrapped value out.
    ///
    /// A mismatch means a decoder and an endpoint disagree on the request type,
    /// which is a wiring bug on the server side.
    pub fn downcast<T: 'static>(self) -> Result<T> {
        let type_name = self.type_name;
        self.value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Error::internal(format!(
                "message type mismatch: expected {}, got {}",
                std::any::type_name::<T>(),
                type_name
            ))
        })
    }

    /// Render the message with the serializer it was built with.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let to_json = self.to_json.ok_or_else(|| {
            Error::Encoding(format!("{} has no default JSON encoding", self.type_name))
        })?;
        to_json(&*self.value).map_err(|e| Error::Encoding(e.to_string()))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.type_name)
            .field("json", &self.to_json.is_some())
            .finish()
    }
}

fn json_bytes<T: Serialize + 'static>(value: &(dyn Any + Send)) -> serde_json::Result<Vec<u8>> {
    match value.downcast_ref::<T>() {
        Some(value) => serde_json::to_vec(value),
        None => Err(<serde_json::Error as serde::ser::Error>::custom(
            "message changed type after construction",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Debug, PartialEq)]
    struct Cat {
        id: String,
        name: String,
    }

    #[test]
    fn serializable_message_renders_json() {
        let msg = Message::serializable(Cat {
            id: "42".into(),
            name: "Whiskers".into(),
        });
        assert!(msg.is::<Cat>());
        assert_eq!(msg.to_json().unwrap(), br#"{"id":"42","name":"Whiskers"}"#.to_vec());
    }

    #[test]
    fn plain_message_has_no_json() {
        let msg = Message::new(7u32);
        assert!(matches!(msg.to_json(), Err(Error::Encoding(_))));
    }

    #[test]
    fn downcast_mismatch_is_internal() {
        let msg = Message::new("text");
        match msg.downcast::<u64>() {
            Err(Error::Handler { kind, .. }) => assert_eq!(kind, crate::ErrorKind::Internal),
            other => panic!("unexpected {other:?}"),
        }
    }
}
