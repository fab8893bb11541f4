//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::schema::TlsConfig;
use crate::error::{Error, Result};
use crate::service::Transport;

/// Load the rustls configuration for the HTTP listener.
pub async fn load_tls_config(tls: &TlsConfig, address: &str) -> Result<RustlsConfig> {
    let bind_error = |source: std::io::Error| Error::Bind {
        transport: Transport::Http,
        address: address.to_string(),
        source,
    };

    for (label, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !Path::new(path).exists() {
            return Err(bind_error(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{label} file not found: {path}"),
            )));
        }
    }

    let config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(bind_error)?;
    tracing::info!(cert = %tls.cert_path, "TLS configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_fail_as_bind_errors() {
        let tls = TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        };
        let err = load_tls_config(&tls, "127.0.0.1:8443").await.unwrap_err();
        match err {
            Error::Bind { transport, source, .. } => {
                assert_eq!(transport, Transport::Http);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
