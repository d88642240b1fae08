//! TLS material loading for the HTTPS listener.
//!
//! The certificate chain is read from `cert_path`, followed by every
//! certificate in `ca_paths`; the private key (PKCS#8, PKCS#1 or SEC1) from
//! `key_path`. Client certificates are not requested.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use geoip_core::TlsConfig;

/// Failure to build the TLS server configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// A PEM file could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A PEM file is malformed.
    #[error("invalid PEM in {path}: {source}")]
    Pem {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: pem::Error,
    },

    /// The certificate file held no certificate.
    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    /// The key file held no private key.
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    /// rustls rejected the key material.
    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

impl TlsError {
    fn from_pem(path: &Path, err: pem::Error) -> Self {
        match err {
            pem::Error::Io(source) => Self::Io {
                path: path.to_owned(),
                source,
            },
            source => Self::Pem {
                path: path.to_owned(),
                source,
            },
        }
    }
}

/// Build a rustls server configuration from PEM files.
///
/// Advertises `h2` and `http/1.1` through ALPN.
///
/// # Errors
///
/// Returns [`TlsError`] when a file is missing or unreadable, holds no usable
/// PEM item, or rustls rejects the key material.
pub fn load_server_config(tls: &TlsConfig) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    let mut chain = load_certs(&tls.cert_path)?;
    for ca_path in &tls.ca_paths {
        chain.extend(load_certs(ca_path)?);
    }
    let key = load_private_key(&tls.key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::debug!(
        cert = %tls.cert_path.display(),
        key = %tls.key_path.display(),
        ca = tls.ca_paths.len(),
        "loaded TLS configuration"
    );

    Ok(Arc::new(config))
}

/// Load every certificate from a PEM file.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| TlsError::from_pem(path, e))?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_owned()));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_file(path).map_err(|e| match e {
        pem::Error::NoItemsFound => TlsError::NoPrivateKey(path.to_owned()),
        e => TlsError::from_pem(path, e),
    })
}
