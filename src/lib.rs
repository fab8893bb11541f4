//! Dual-protocol endpoint registry and dispatch core.
//!
//! A service declares its HTTP routes and RPC methods once, in a
//! [`ServiceDescriptor`]; a [`ServerHost`] serves them on two listeners.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────── ServerHost ────────────────────────┐
//!                    │                                                             │
//!   HTTP request ────┼─▶ net ─▶ http::server ─▶ routing ──┐                        │
//!                    │                                     ├─▶ codec (decode)       │
//!   RPC call ────────┼─▶ net ─▶ rpc::server ─▶ registry ──┘        │               │
//!                    │                                              ▼               │
//!                    │                        middleware chain (service-wide first) │
//!                    │                                              │               │
//!                    │                                              ▼               │
//!                    │                                    handler (Endpoint)        │
//!                    │                                              │               │
//!   response ◀───────┼──────────── options/status ◀── codec (encode)               │
//!                    │                                                             │
//!                    │  lifecycle · config · observability · error                 │
//!                    └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let get_cat = Endpoint::new(|_ctx, req: GetCat| async move {
//!     Ok(Cat { id: req.id, name: "Whiskers".into() })
//! });
//! let service = ServiceDescriptor::builder("cats")
//!     .http_endpoint("/cats/{id}", Method::GET, get_cat.clone())
//!     .rpc_method("GetCat", get_cat)
//!     .build();
//! let host = ServerHost::new(HostConfig::default(), service)?;
//! host.run_until(wait_for_signal()).await?;
//! ```

// Service declaration
pub mod codec;
pub mod middleware;
pub mod service;

// Transports
pub mod http;
pub mod net;
pub mod routing;
pub mod rpc;

// Hosting
pub mod host;
pub mod lifecycle;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use config::HostConfig;
pub use error::{Error, ErrorKind, Result};
pub use host::ServerHost;
pub use lifecycle::HostState;
pub use service::{Context, Endpoint, Message, ServiceDescriptor, Transport};
