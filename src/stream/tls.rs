use crate::config::SslConfig;
use crate::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Builds a TLS acceptor from PEM certificate and key files.
///
/// rustls only consumes unencrypted key material, so a configured
/// `passwd` is rejected up front rather than failing on the first
/// handshake.
pub fn build_acceptor(config: &SslConfig) -> crate::error::Result<TlsAcceptor> {
    if config.passwd.as_deref().map(|p| !p.is_empty()).unwrap_or(false) {
        return Err(Error::TlsHandshake(
            "encrypted private keys are not supported; provide an unencrypted PEM key".to_string(),
        ));
    }

    let certs = load_certs(config)?;
    let key = load_key(config)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::TlsHandshake(format!("invalid certificate/key pair: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(config: &SslConfig) -> crate::error::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(&config.cert_file)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::TlsHandshake(format!("failed to read certificate chain: {e}")))?;
    if certs.is_empty() {
        return Err(Error::TlsHandshake(format!(
            "no certificates found in {}",
            config.cert_file.display()
        )));
    }
    Ok(certs)
}

fn load_key(config: &SslConfig) -> crate::error::Result<PrivateKeyDer<'static>> {
    let file = File::open(&config.key_file)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::TlsHandshake(format!("failed to read private key: {e}")))?
        .ok_or_else(|| {
            Error::TlsHandshake(format!(
                "no private key found in {}",
                config.key_file.display()
            ))
        })
}
