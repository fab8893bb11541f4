//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::uri::PathAndQuery;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::Channel;
use tonic::Status;

use service_kit::{HostConfig, ServerHost, ServiceDescriptor};

#[derive(Debug, Deserialize)]
pub struct GetCat {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Cat {
    pub id: String,
    pub name: String,
}

/// Host config bound to ephemeral loopback ports.
pub fn local_config() -> HostConfig {
    let mut config = HostConfig::default();
    config.http.bind_address = "127.0.0.1:0".into();
    config.rpc.bind_address = "127.0.0.1:0".into();
    config
}

/// Build and start a host for `service`.
pub async fn start_host(service: ServiceDescriptor) -> Arc<ServerHost> {
    let host = Arc::new(ServerHost::new(local_config(), service).unwrap());
    host.start().await.unwrap();
    host
}

pub fn http_url(host: &ServerHost, path: &str) -> String {
    format!("http://{}{}", host.http_addr().unwrap(), path)
}

/// Client-side JSON codec for calling the RPC listener with tonic.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = JsonCodec;
    type Decoder = JsonCodec;

    fn encoder(&mut self) -> Self::Encoder {
        JsonCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonCodec
    }
}

impl Encoder for JsonCodec {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Value, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        let payload = serde_json::to_vec(&item).map_err(|e| Status::internal(e.to_string()))?;
        dst.put_slice(&payload);
        Ok(())
    }
}

impl Decoder for JsonCodec {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Value>, Status> {
        let payload = src.copy_to_bytes(src.remaining());
        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| Status::internal(e.to_string()))
    }
}

/// Make one unary call to `method` (`{service}/{method}`) over a fresh channel.
pub async fn rpc_call(host: &ServerHost, method: &str, message: Value) -> Result<Value, Status> {
    let channel = Channel::from_shared(format!("http://{}", host.rpc_addr().unwrap()))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut client = tonic::client::Grpc::new(channel);
    client.ready().await.unwrap();

    let path = PathAndQuery::try_from(format!("/{method}")).unwrap();
    client
        .unary(tonic::Request::new(message), path, JsonCodec)
        .await
        .map(tonic::Response::into_inner)
}

/// Poll until `host` reports `expected` in-flight requests.
pub async fn wait_for_in_flight(host: &ServerHost, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while host.in_flight() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests should reach the host");
}
