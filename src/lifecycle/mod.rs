//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (host.rs):
//!     Register bindings → Bind both listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Cancel in-flight contexts → Stop accepting → Drain → Force close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown (binary only)
//! ```
//!
//! # Design Decisions
//! - Host state is a single watch channel, observable from tests and tasks
//! - Stopped is terminal; a stopped host is never reused
//! - Shutdown has a deadline: forced close after the grace period

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{HostState, StateCell};
