//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being handled, per transport
//! - Let the host wait until the count drops to zero during drain
//! - Report the count as a gauge
//!
//! # Design Decisions
//! - RAII guard: the count drops even if the handler future is cancelled or
//!   panics
//! - Backed by a watch channel so waiters wake on the last drop instead of
//!   polling

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::watch;

use crate::observability::metrics;
use crate::service::Transport;

/// Tracks active requests for graceful shutdown.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    transport: Transport,
    active: Arc<watch::Sender<u64>>,
}

impl RequestTracker {
    pub fn new(transport: Transport) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            transport,
            active: Arc::new(tx),
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Record a new request. The returned guard ends it on drop.
    pub fn track(&self) -> RequestGuard {
        self.active.send_modify(|n| *n += 1);
        metrics::record_in_flight(self.transport, 1.0);
        RequestGuard {
            transport: self.transport,
            active: Arc::clone(&self.active),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Resolve once no request is active.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Guard that tracks one request's lifetime.
#[derive(Debug)]
pub struct RequestGuard {
    transport: Transport,
    active: Arc<watch::Sender<u64>>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        metrics::record_in_flight(self.transport, -1.0);
        tracing::trace!(transport = %self.transport, "Request finished");
    }
}

/// Axum middleware holding a [`RequestGuard`] for the whole request.
pub async fn track_in_flight(
    State(tracker): State<RequestTracker>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tracker_counts() {
        let tracker = RequestTracker::new(Transport::Http);
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.clone().track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_wakes_on_last_drop() {
        let tracker = RequestTracker::new(Transport::Rpc);
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_idle() {
        let tracker = RequestTracker::new(Transport::Http);
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .expect("idle tracker");
    }
}
