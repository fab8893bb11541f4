//! Host state machine.
//!
//! ```text
//! Configured → Starting → Serving → Draining → Stopped
//!      │           │                              ▲
//!      └───────────┴──────────────────────────────┘
//! ```
//!
//! `Starting → Stopped` happens when a listener fails to bind,
//! `Configured → Stopped` when a host is shut down without being started.

use std::fmt;

use tokio::sync::watch;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Configured,
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl HostState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: HostState) -> bool {
        use HostState::*;
        matches!(
            (self, next),
            (Configured, Starting)
                | (Configured, Stopped)
                | (Starting, Serving)
                | (Starting, Stopped)
                | (Serving, Draining)
                | (Draining, Stopped)
        )
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostState::Configured => "configured",
            HostState::Starting => "starting",
            HostState::Serving => "serving",
            HostState::Draining => "draining",
            HostState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Observable holder of the current [`HostState`].
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<HostState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(HostState::Configured);
        Self { tx }
    }

    pub fn get(&self) -> HostState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HostState> {
        self.tx.subscribe()
    }

    /// Move to `next`, failing with [`Error::InvalidState`] on an illegal edge.
    pub fn transition(&self, next: HostState, operation: &'static str) -> Result<()> {
        let mut previous = self.get();
        let changed = self.tx.send_if_modified(|state| {
            previous = *state;
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if !changed {
            return Err(Error::InvalidState {
                operation,
                state: previous,
            });
        }
        tracing::debug!(from = %previous, to = %next, "Host state changed");
        Ok(())
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
