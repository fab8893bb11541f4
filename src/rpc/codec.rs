//! tonic codec carrying the per-method payload decoder.
//!
//! tonic owns the gRPC wire format: the length-prefixed message frame, the
//! size limit on the decoding side, and status trailers. This codec only
//! sees the payload of one message. Requests are decoded with the method's
//! [`RpcDecoder`] (JSON unless the method sets its own). Responses arrive
//! already encoded, since encoding runs inside the call so its failures
//! surface as the call's status.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

use crate::codec::RpcDecoder;
use crate::rpc::options::ResolvedRpcOptions;
use crate::service::Message;

#[derive(Clone)]
pub struct MessageCodec {
    decoder: RpcDecoder,
    options: Arc<ResolvedRpcOptions>,
}

impl MessageCodec {
    pub fn new(decoder: RpcDecoder, options: Arc<ResolvedRpcOptions>) -> Self {
        Self { decoder, options }
    }
}

impl Codec for MessageCodec {
    type Encode = Bytes;
    type Decode = Message;
    type Encoder = PayloadEncoder;
    type Decoder = MessageDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        PayloadEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        MessageDecoder {
            decoder: self.decoder.clone(),
            options: Arc::clone(&self.options),
        }
    }
}

#[derive(Debug)]
pub struct PayloadEncoder;

impl Encoder for PayloadEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        dst.put(item);
        Ok(())
    }
}

pub struct MessageDecoder {
    decoder: RpcDecoder,
    options: Arc<ResolvedRpcOptions>,
}

impl Decoder for MessageDecoder {
    type Item = Message;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Message>, Status> {
        let payload = src.copy_to_bytes(src.remaining());
        self.decoder.decode(&payload).map(Some).map_err(|err| {
            tracing::debug!(error = %err, "RPC message rejected");
            self.options.status_for(&err)
        })
    }
}
