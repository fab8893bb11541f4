//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve and bind the configured address of each transport
//! - Bind both transports or neither
//! - Hand the bound sockets to the axum-server accept loops

use std::net::{SocketAddr, TcpListener as StdTcpListener};

use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::service::Transport;

/// A bound socket waiting to be served.
#[derive(Debug)]
pub struct BoundListener {
    transport: Transport,
    local_addr: SocketAddr,
    inner: StdTcpListener,
}

impl BoundListener {
    /// Bind `address` for `transport`.
    pub async fn bind(transport: Transport, address: &str) -> Result<Self> {
        let bind_error = |source: std::io::Error| Error::Bind {
            transport,
            address: address.to_string(),
            source,
        };

        let addr: SocketAddr = address
            .parse()
            .map_err(|e| bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        // tokio sockets are already non-blocking, as axum-server expects.
        let inner = listener.into_std().map_err(bind_error)?;

        tracing::info!(transport = %transport, address = %local_addr, "Listener bound");

        Ok(Self {
            transport,
            local_addr,
            inner,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The bound address; resolves port 0 to the assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_std(self) -> StdTcpListener {
        self.inner
    }
}

/// Bind the HTTP and RPC addresses.
///
/// If either bind fails the other socket is dropped before returning, so no
/// port stays claimed.
pub async fn bind_pair(http: &str, rpc: &str) -> Result<(BoundListener, BoundListener)> {
    let http = BoundListener::bind(Transport::Http, http).await?;
    let rpc = match BoundListener::bind(Transport::Rpc, rpc).await {
        Ok(rpc) => rpc,
        Err(err) => {
            tracing::warn!(address = %http.local_addr(), "Releasing HTTP listener after RPC bind failure");
            drop(http);
            return Err(err);
        }
    };
    Ok((http, rpc))
}
