//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (tower layers: request ID, trace, in-flight, limits)
//!     → router lookup (routing/)
//!     → request.rs (stage tracking, body limit)
//!     → decoder → middleware chain → handler → encoder
//!     → response.rs (status, headers, redirects)
//! ```

pub mod options;
pub mod request;
pub mod response;
pub mod server;

pub use options::{HttpOption, ResolvedOptions, StatusPolicy};
pub use request::X_REQUEST_ID;
pub use server::HttpDispatcher;
