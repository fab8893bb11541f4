//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! config bind addresses
//!     → listener.rs (bind both ports, or neither)
//!     → tls.rs (optional rustls config for HTTP)
//!     → axum-server accept loop
//!     → connection.rs (in-flight request tracking for drain)
//! ```
//!
//! # Design Decisions
//! - Sockets are bound before any serving task starts, so a bind failure
//!   leaves nothing half-running
//! - TLS is optional and handled transparently by axum-server

pub mod connection;
pub mod listener;
pub mod tls;
