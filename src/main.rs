//! service-kit host binary.
//!
//! Serves the demonstration cats service on an HTTP and an RPC listener.
//!
//! ```text
//! service-kit --config service-kit.toml
//!
//! GET  http://127.0.0.1:8080/cats/42
//! gRPC http://127.0.0.1:9000/pets.Cats/GetCat   (JSON-encoded message {"id":"42"})
//! ```

mod cats;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use service_kit::config::{load_config, HostConfig};
use service_kit::lifecycle::signals::wait_for_signal;
use service_kit::observability::{logging, metrics};
use service_kit::{Error, ServerHost};

#[derive(Debug, Parser)]
#[command(name = "service-kit", version, about = "Dual-protocol service host")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        http = %config.http.bind_address,
        rpc = %config.rpc.bind_address,
        "service-kit starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let host = ServerHost::new(config, cats::service(Arc::new(cats::CatStore::seeded())))?;
    match host.run_until(wait_for_signal()).await {
        Ok(()) => Ok(()),
        Err(Error::ShutdownTimeout { abandoned, .. }) => {
            tracing::warn!(abandoned, "Shutdown finished after abandoning requests");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
