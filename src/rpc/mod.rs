//! RPC transport subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP/2 POST /{service}/{method}
//!     → server.rs (lookup, limits, deadline)
//!     → tonic unary server (gRPC framing, status trailers)
//!     → codec.rs (payload → request message)
//!     → middleware chain → handler
//!     → options.rs (error kind → status code)
//! ```

pub mod codec;
pub mod options;
pub mod registry;
pub mod server;

pub use options::{RpcOption, DEFAULT_MAX_MESSAGE_BYTES};
pub use registry::MethodRegistry;
pub use server::RpcDispatcher;
pub use tonic::{Code, Status};
