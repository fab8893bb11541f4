//! Server host: owns both listeners and drives the lifecycle.
//!
//! # Responsibilities
//! - Register the service's HTTP routes and RPC methods at construction
//! - Bind both listeners (both or neither) and serve them
//! - Drain in-flight requests on shutdown, force-closing at the deadline
//!
//! # Data Flow
//! ```text
//! new()      → HttpDispatcher + RpcDispatcher         (Configured)
//! start()    → load TLS → bind_pair → spawn servers   (Starting → Serving)
//! shutdown() → cancel contexts → stop accepting
//!            → wait for in-flight ≤ grace → force close (Draining → Stopped)
//! ```
//!
//! # Design Decisions
//! - Methods take `&self` so a host can be shared behind an `Arc` and shut
//!   down from another task
//! - A host is never reused after `Stopped`

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use axum_server::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::schema::HostConfig;
use crate::error::{Error, Result};
use crate::http::HttpDispatcher;
use crate::lifecycle::{HostState, Shutdown, StateCell};
use crate::net::connection::RequestTracker;
use crate::net::{listener, tls};
use crate::observability::metrics;
use crate::rpc::RpcDispatcher;
use crate::service::{ServiceDescriptor, Transport};

struct Running {
    http: Handle,
    rpc: Handle,
    tasks: Vec<JoinHandle<()>>,
}

/// Hosts one service on an HTTP and an RPC listener.
pub struct ServerHost {
    config: HostConfig,
    service: String,
    http: Arc<HttpDispatcher>,
    rpc: Arc<RpcDispatcher>,
    state: StateCell,
    shutdown: Shutdown,
    http_tracker: RequestTracker,
    rpc_tracker: RequestTracker,
    addrs: OnceLock<(SocketAddr, SocketAddr)>,
    running: Mutex<Option<Running>>,
}

impl ServerHost {
    /// Register every binding of `service`.
    ///
    /// Fails on the first duplicate or invalid binding; nothing is served.
    pub fn new(config: HostConfig, service: ServiceDescriptor) -> Result<Self> {
        let http = HttpDispatcher::new(&service, config.http.max_body_bytes)?;
        let rpc = RpcDispatcher::new(&service, config.rpc.max_message_bytes)?;

        tracing::info!(
            service = %service.name(),
            http_routes = http.route_count(),
            rpc_methods = service.rpc_methods().len(),
            "Service registered"
        );

        Ok(Self {
            config,
            service: service.name().to_string(),
            http: Arc::new(http),
            rpc: Arc::new(rpc),
            state: StateCell::new(),
            shutdown: Shutdown::new(),
            http_tracker: RequestTracker::new(Transport::Http),
            rpc_tracker: RequestTracker::new(Transport::Rpc),
            addrs: OnceLock::new(),
            running: Mutex::new(None),
        })
    }

    pub fn state(&self) -> HostState {
        self.state.get()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<HostState> {
        self.state.subscribe()
    }

    /// Bound HTTP address, once started.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.addrs.get().map(|(http, _)| *http)
    }

    /// Bound RPC address, once started.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.addrs.get().map(|(_, rpc)| *rpc)
    }

    /// Requests currently being handled on both transports.
    pub fn in_flight(&self) -> u64 {
        self.http_tracker.active_count() + self.rpc_tracker.active_count()
    }

    /// Bind both listeners and start serving.
    pub async fn start(&self) -> Result<()> {
        self.state.transition(HostState::Starting, "start")?;

        match self.serve().await {
            Ok(running) => {
                *self.lock_running() = Some(running);
                self.state.transition(HostState::Serving, "start")?;
                tracing::info!(
                    service = %self.service,
                    http = ?self.http_addr(),
                    rpc = ?self.rpc_addr(),
                    "Host serving"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(service = %self.service, error = %err, "Host failed to start");
                self.state.transition(HostState::Stopped, "start")?;
                Err(err)
            }
        }
    }

    async fn serve(&self) -> Result<Running> {
        let tls = match &self.config.http.tls {
            Some(tls) => Some(tls::load_tls_config(tls, &self.config.http.bind_address).await?),
            None => None,
        };

        let (http_listener, rpc_listener) =
            listener::bind_pair(&self.config.http.bind_address, &self.config.rpc.bind_address).await?;
        let _ = self.addrs.set((http_listener.local_addr(), rpc_listener.local_addr()));

        let http_app = crate::http::server::build_router(
            Arc::clone(&self.http),
            &self.config.http,
            self.shutdown.subscribe(),
            self.http_tracker.clone(),
        );
        let rpc_app = crate::rpc::server::build_router(
            Arc::clone(&self.rpc),
            &self.config.rpc,
            self.shutdown.subscribe(),
            self.rpc_tracker.clone(),
        );

        let http_handle = Handle::new();
        let rpc_handle = Handle::new();

        let http_task = match tls {
            Some(tls) => {
                let server = axum_server::tls_rustls::from_tcp_rustls(http_listener.into_std(), tls)
                    .handle(http_handle.clone());
                tokio::spawn(async move {
                    log_exit(Transport::Http, server.serve(http_app.into_make_service()).await);
                })
            }
            None => {
                let server = axum_server::from_tcp(http_listener.into_std()).handle(http_handle.clone());
                tokio::spawn(async move {
                    log_exit(Transport::Http, server.serve(http_app.into_make_service()).await);
                })
            }
        };

        let server = axum_server::from_tcp(rpc_listener.into_std()).handle(rpc_handle.clone());
        let rpc_task = tokio::spawn(async move {
            log_exit(Transport::Rpc, server.serve(rpc_app.into_make_service()).await);
        });

        Ok(Running {
            http: http_handle,
            rpc: rpc_handle,
            tasks: vec![http_task, rpc_task],
        })
    }

    /// Drain and stop.
    ///
    /// Waits up to `grace` for in-flight requests, then force-closes the
    /// remaining connections. The host is `Stopped` when this returns, even
    /// on [`Error::ShutdownTimeout`]. Calling it again is a no-op.
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        let mut state = self.state.subscribe();
        loop {
            let current = *state.borrow_and_update();
            match current {
                HostState::Stopped => return Ok(()),
                HostState::Configured => {
                    if self.state.transition(HostState::Stopped, "shutdown").is_ok() {
                        tracing::info!(service = %self.service, "Host stopped before starting");
                        return Ok(());
                    }
                }
                HostState::Serving => {
                    if self.state.transition(HostState::Draining, "shutdown").is_ok() {
                        break;
                    }
                }
                // Another caller owns this transition; wait for it to settle.
                HostState::Starting | HostState::Draining => {
                    let _ = state.changed().await;
                }
            }
        }

        let started = Instant::now();
        tracing::info!(
            service = %self.service,
            grace_ms = grace.as_millis() as u64,
            in_flight = self.in_flight(),
            "Draining"
        );

        self.shutdown.trigger();
        let running = self.lock_running().take();
        if let Some(running) = &running {
            running.http.graceful_shutdown(Some(grace));
            running.rpc.graceful_shutdown(Some(grace));
        }

        let idle = async {
            tokio::join!(self.http_tracker.wait_idle(), self.rpc_tracker.wait_idle());
        };
        let abandoned = match tokio::time::timeout(grace, idle).await {
            Ok(()) => 0,
            Err(_) => self.in_flight(),
        };

        if let Some(running) = running {
            running.http.shutdown();
            running.rpc.shutdown();
            for task in running.tasks {
                task.abort();
                let _ = task.await;
            }
        }

        self.state.transition(HostState::Stopped, "shutdown")?;

        if abandoned > 0 {
            metrics::record_abandoned(abandoned);
            tracing::warn!(
                service = %self.service,
                abandoned,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Grace period expired; in-flight requests abandoned"
            );
            return Err(Error::ShutdownTimeout { grace, abandoned });
        }

        tracing::info!(
            service = %self.service,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Host stopped"
        );
        Ok(())
    }

    /// Start, wait for `signal`, then shut down with the configured grace period.
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        signal.await;
        self.shutdown(self.config.shutdown.grace_period()).await
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_exit(transport: Transport, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(transport = %transport, "Listener closed"),
        Err(e) => tracing::error!(transport = %transport, error = %e, "Listener failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Endpoint;
    use axum::http::Method;
    use serde_json::Value;

    fn local_config() -> HostConfig {
        let mut config = HostConfig::default();
        config.http.bind_address = "127.0.0.1:0".into();
        config.rpc.bind_address = "127.0.0.1:0".into();
        config
    }

    fn echo_service() -> ServiceDescriptor {
        let echo = Endpoint::new(|_ctx, req: Value| async move { Ok::<_, Error>(req) });
        ServiceDescriptor::builder("echo")
            .http_endpoint("/echo", Method::POST, echo.clone())
            .rpc_method("Echo", echo)
            .build()
    }

    #[tokio::test]
    async fn lifecycle_moves_through_every_state() {
        let host = ServerHost::new(local_config(), echo_service()).unwrap();
        assert_eq!(host.state(), HostState::Configured);
        assert!(host.http_addr().is_none());

        host.start().await.unwrap();
        assert_eq!(host.state(), HostState::Serving);
        assert_ne!(host.http_addr().unwrap().port(), 0);
        assert_ne!(host.rpc_addr().unwrap().port(), 0);

        host.shutdown(Duration::from_millis(200)).await.unwrap();
        assert_eq!(host.state(), HostState::Stopped);
    }

    #[tokio::test]
    async fn start_after_stop_is_rejected() {
        let host = ServerHost::new(local_config(), echo_service()).unwrap();
        host.start().await.unwrap();
        host.shutdown(Duration::from_millis(100)).await.unwrap();

        let err = host.start().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: HostState::Stopped,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_works_before_start() {
        let host = ServerHost::new(local_config(), echo_service()).unwrap();
        host.shutdown(Duration::from_millis(10)).await.unwrap();
        host.shutdown(Duration::from_millis(10)).await.unwrap();
        assert_eq!(host.state(), HostState::Stopped);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let host = ServerHost::new(local_config(), echo_service()).unwrap();
        host.start().await.unwrap();
        assert!(matches!(host.start().await, Err(Error::InvalidState { .. })));
        host.shutdown(Duration::from_millis(100)).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_binding_aborts_construction() {
        let echo = Endpoint::new(|_ctx, req: Value| async move { Ok::<_, Error>(req) });
        let service = ServiceDescriptor::builder("echo")
            .http_endpoint("/echo", Method::POST, echo.clone())
            .http_endpoint("/echo", Method::POST, echo)
            .build();
        assert!(matches!(
            ServerHost::new(local_config(), service),
            Err(Error::DuplicateBinding(_))
        ));
    }

    #[tokio::test]
    async fn bind_failure_stops_the_host() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = local_config();
        config.rpc.bind_address = taken.local_addr().unwrap().to_string();

        let host = ServerHost::new(config, echo_service()).unwrap();
        let err = host.start().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Bind {
                transport: Transport::Rpc,
                ..
            }
        ));
        assert_eq!(host.state(), HostState::Stopped);
    }
}
