//! Integration tests for the GeoIP server.
//!
//! Every test starts its own server in-process on ephemeral ports, backed by
//! a small fixture database, and talks to it over real sockets with
//! `reqwest`.
//!
//! ```text
//! cargo test -p geoip-integration
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use anyhow::Result;
use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::CertificateDer;
use tempfile::TempDir;

use geoip_core::{CountryDatabase, ServerConfig, ServerEvent, TlsConfig};
use geoip_http::{GeoIpServer, RunningServer};

static INIT: Once = Once::new();

/// Fixture database: two IPv4 ranges and one IPv6 range.
pub const FIXTURE_CSV: &str = r#"# start,end,start_num,end_num,code,name
"1.2.3.0","1.2.3.255","16909056","16909311","AU","Australia"
"8.8.8.0","8.8.8.255","134744064","134744319","US","United States"
"2001:4860::","2001:4860:ffff:ffff:ffff:ffff:ffff:ffff","0","0","US","United States"
"#;

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Server configuration bound to `127.0.0.1` on an ephemeral port.
#[must_use]
pub fn local_config() -> ServerConfig {
    ServerConfig::builder()
        .listen_host("127.0.0.1".to_owned())
        .listen_port(0)
        .build()
}

/// HTTP client for the plain listener; ignores proxy settings.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build reqwest client")
}

/// A server running in the current test, with every event it emitted.
#[derive(Debug)]
pub struct TestServer {
    running: RunningServer,
    events: Arc<Mutex<Vec<ServerEvent>>>,
}

impl TestServer {
    /// Start a server over the fixture database.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid or no listener comes up.
    pub async fn start(config: ServerConfig) -> Self {
        init_tracing();

        let database = CountryDatabase::from_csv(FIXTURE_CSV).expect("fixture database");
        let server = GeoIpServer::new(config, Arc::new(database)).expect("valid configuration");

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        server.subscribe(move |event: &ServerEvent| sink.lock().push(event.clone()));

        let running = server.start().await;
        assert!(
            running.bind_errors().is_empty(),
            "listener failed: {:?}",
            running.bind_errors()
        );
        Self { running, events }
    }

    /// Base URL of the plain listener.
    ///
    /// # Panics
    ///
    /// Panics if the plain listener is not bound.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        let addr = self.running.plain_addr().expect("plain listener");
        format!("http://{addr}{path_and_query}")
    }

    /// The server handle.
    #[must_use]
    pub fn running(&self) -> &RunningServer {
        &self.running
    }

    /// Events emitted so far.
    #[must_use]
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events.lock().clone()
    }

    /// Number of `lookup` events emitted so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ServerEvent::Lookup(_)))
            .count()
    }

    /// Drain connections and stop.
    pub async fn stop(self) {
        self.running.shutdown().await;
    }
}

/// A CA-signed certificate for `localhost`, written to a temporary directory.
#[derive(Debug)]
pub struct TlsMaterial {
    _dir: TempDir,
    /// Server certificate PEM.
    pub cert_path: PathBuf,
    /// Server private key PEM.
    pub key_path: PathBuf,
    /// Issuing CA certificate PEM.
    pub ca_path: PathBuf,
    /// Issuing CA certificate, for client trust stores.
    pub ca_der: CertificateDer<'static>,
}

impl TlsMaterial {
    /// Generate a CA and a server certificate signed by it.
    ///
    /// # Errors
    ///
    /// Returns an error if generation or writing fails.
    pub fn generate() -> Result<Self> {
        let ca_key = KeyPair::generate()?;
        let mut ca_params = CertificateParams::default();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "GeoIP Test CA");
        ca_params.key_usages.push(KeyUsagePurpose::KeyCertSign);
        let ca_cert = ca_params.self_signed(&ca_key)?;
        let issuer = Issuer::from_params(&ca_params, &ca_key);

        let server_key = KeyPair::generate()?;
        let mut server_params = CertificateParams::new(vec!["localhost".to_owned()])?;
        server_params
            .distinguished_name
            .push(DnType::CommonName, "localhost");
        server_params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ServerAuth);
        let server_cert = server_params.signed_by(&server_key, &issuer)?;

        let dir = TempDir::new()?;
        let cert_path = dir.path().join("server.pem");
        let key_path = dir.path().join("server.key");
        let ca_path = dir.path().join("ca.pem");
        std::fs::write(&cert_path, server_cert.pem())?;
        std::fs::write(&key_path, server_key.serialize_pem())?;
        std::fs::write(&ca_path, ca_cert.pem())?;

        Ok(Self {
            _dir: dir,
            cert_path,
            key_path,
            ca_path,
            ca_der: ca_cert.der().clone(),
        })
    }

    /// TLS listener settings on an ephemeral port.
    #[must_use]
    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig::builder()
            .key_path(self.key_path.clone())
            .cert_path(self.cert_path.clone())
            .ca_paths(vec![self.ca_path.clone()])
            .port(0)
            .build()
    }
}

/// HTTPS client trusting `ca`, with `localhost` resolved to `addr`.
///
/// # Panics
///
/// Panics if the certificate is rejected or the client cannot be built.
#[must_use]
pub fn https_client(ca: &CertificateDer<'static>, addr: SocketAddr) -> reqwest::Client {
    // Both ring and the reqwest default provider may be compiled in.
    let _ = rustls::crypto::ring::default_provider().install_default();

    reqwest::Client::builder()
        .no_proxy()
        .add_root_certificate(reqwest::Certificate::from_der(ca.as_ref()).expect("CA certificate"))
        .resolve("localhost", addr)
        .build()
        .expect("build reqwest client")
}

/// URL on the TLS listener at `addr`, addressed by the certificate's name.
#[must_use]
pub fn https_url(addr: SocketAddr, path_and_query: &str) -> String {
    format!("https://localhost:{}{path_and_query}", addr.port())
}

mod test_auth;
mod test_events;
mod test_lookup;
mod test_tls;
