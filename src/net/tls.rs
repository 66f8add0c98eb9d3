//! TLS configuration and certificate loading.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load a rustls server configuration from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> io::Result<RustlsConfig> {
    ensure_pem_file(cert_path, "Certificate")?;
    ensure_pem_file(key_path, "Private key")?;

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::debug!(cert = ?cert_path, key = ?key_path, "TLS certificate loaded");
    Ok(config)
}

fn ensure_pem_file(path: &Path, what: &str) -> io::Result<()> {
    match path.metadata() {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} path is not a file: {path:?}"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{what} file not found: {path:?}"),
        )),
        Err(e) => Err(e),
    }
}
