//! TLS certificate loading.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

fn require_file(path: &Path, what: &str) -> io::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found: {}", what, path.display()),
        ))
    }
}

/// Load the certificate chain and private key (PEM).
pub async fn load_tls_config(config: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);
    require_file(cert_path, "Certificate file")?;
    require_file(key_path, "Private key file")?;

    let tls = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
    Ok(tls)
}
