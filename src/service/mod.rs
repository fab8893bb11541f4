//! Service-side building blocks.
//!
//! # Data Flow
//! ```text
//! Service implementation
//!     → endpoint.rs (typed handler → erased Endpoint)
//!     → descriptor.rs (HTTP table, RPC table, middleware, options)
//!     → ServerHost::new (registration)
//!
//! Per request:
//!     context.rs (request id, params, metadata, cancellation)
//!     message.rs (erased request/response values)
//! ```

pub mod context;
pub mod descriptor;
pub mod endpoint;
pub mod message;

pub use context::{Context, PathParams, Transport};
pub use descriptor::{HttpEndpoint, HttpRoute, RpcMethod, ServiceBuilder, ServiceDescriptor};
pub use endpoint::Endpoint;
pub use message::Message;
