//! GeoIP Server - country lookups over HTTP and HTTPS.
//!
//! Serves `GET /location/:ip` (configurable) from a GeoIP country CSV
//! database, optionally requiring a SHA-1 request signature and emitting CORS
//! headers.
//!
//! # Usage
//!
//! ```text
//! geoip-server --secret abc --cors --sslkey server.key --sslcert server.pem
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GEOIP_SECRET` | *(key file)* | Shared secret for request signatures |
//! | `GEOIP_LOOKUP_PATH` | `/location/:ip` | Lookup path template |
//! | `GEOIP_CORS` | `false` | Emit CORS headers and answer preflights |
//! | `GEOIP_CORS_ORIGIN` | `*` | Allowed origin |
//! | `GEOIP_HOST` | `0.0.0.0` | Bind host |
//! | `GEOIP_PORT` | `8888` | Plain HTTP port |
//! | `GEOIP_SSL_KEY` / `GEOIP_SSL_CERT` | *(unset)* | PEM key and certificate; both enable HTTPS |
//! | `GEOIP_SSL_CA` | *(unset)* | Comma-separated extra CA certificates |
//! | `GEOIP_SSL_PORT` | `4443` | HTTPS port |
//! | `GEOIP_DATABASE` | `GeoIPCountryWhois.csv` | Country database |
//! | `GEOIP_QUIET` | `false` | Do not log lookups |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Without a secret, `.geoip-server-key` in the working directory is read.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geoip_core::config::{DEFAULT_CORS_ORIGIN, DEFAULT_LOOKUP_PATH, DEFAULT_PORT, DEFAULT_TLS_PORT};
use geoip_core::{CountryDatabase, ServerConfig, ServerEvent, TlsConfig};
use geoip_http::GeoIpServer;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File read for the secret when none is given.
const KEY_FILE: &str = ".geoip-server-key";

#[derive(Debug, Parser)]
#[command(name = "geoip-server", version, about = "GeoIP country lookup server")]
struct Cli {
    /// Shared secret for request signatures.
    #[arg(short = 's', long, env = "GEOIP_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Lookup path template; must contain one `:ip` segment.
    #[arg(long = "url", env = "GEOIP_LOOKUP_PATH", default_value = DEFAULT_LOOKUP_PATH)]
    lookup_path: String,

    /// Emit CORS headers and answer preflight requests.
    #[arg(long, env = "GEOIP_CORS")]
    cors: bool,

    /// Value of `Access-Control-Allow-Origin`.
    #[arg(long, env = "GEOIP_CORS_ORIGIN", default_value = DEFAULT_CORS_ORIGIN)]
    cors_origin: String,

    /// Host to bind.
    #[arg(long, env = "GEOIP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Plain HTTP port.
    #[arg(short = 'p', long, env = "GEOIP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// PEM private key for HTTPS.
    #[arg(long = "sslkey", env = "GEOIP_SSL_KEY")]
    ssl_key: Option<PathBuf>,

    /// PEM certificate chain for HTTPS.
    #[arg(long = "sslcert", env = "GEOIP_SSL_CERT")]
    ssl_cert: Option<PathBuf>,

    /// Extra PEM CA certificate appended to the chain (repeatable).
    #[arg(long = "sslca", env = "GEOIP_SSL_CA", value_delimiter = ',')]
    ssl_ca: Vec<PathBuf>,

    /// HTTPS port.
    #[arg(long, env = "GEOIP_SSL_PORT", default_value_t = DEFAULT_TLS_PORT)]
    ssl_port: u16,

    /// GeoIP country CSV database.
    #[arg(short = 'd', long, env = "GEOIP_DATABASE", default_value = "GeoIPCountryWhois.csv")]
    database: PathBuf,

    /// Do not log lookup and listening events.
    #[arg(long, env = "GEOIP_QUIET")]
    quiet: bool,

    /// Log level filter.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `--log-level` value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Pick the secret: explicit value first, then the key file.
///
/// A missing key file means no secret; an empty one too.
fn resolve_secret(explicit: Option<String>, key_file: &Path) -> Result<Option<String>> {
    if let Some(secret) = explicit {
        return Ok(Some(secret));
    }

    match std::fs::read_to_string(key_file) {
        Ok(contents) => {
            let secret = contents.trim();
            if secret.is_empty() {
                warn!(path = %key_file.display(), "key file is empty, ignoring");
                Ok(None)
            } else {
                info!(path = %key_file.display(), "loaded secret from key file");
                Ok(Some(secret.to_owned()))
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", key_file.display())),
    }
}

/// Build the [`ServerConfig`] from the command line.
fn build_config(cli: &Cli, secret_key: Option<String>) -> ServerConfig {
    let tls = match (&cli.ssl_key, &cli.ssl_cert) {
        (Some(key), Some(cert)) => Some(
            TlsConfig::builder()
                .key_path(key.clone())
                .cert_path(cert.clone())
                .ca_paths(cli.ssl_ca.clone())
                .port(cli.ssl_port)
                .build(),
        ),
        (None, None) => None,
        _ => {
            warn!("both --sslkey and --sslcert are required for HTTPS, serving plain HTTP only");
            None
        }
    };

    ServerConfig::builder()
        .secret_key(secret_key)
        .lookup_path(cli.lookup_path.clone())
        .cors_enabled(cli.cors)
        .cors_origin(cli.cors_origin.clone())
        .listen_host(cli.host.clone())
        .listen_port(cli.port)
        .tls(tls)
        .build()
}

/// Log server events.
fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::Listening(listening) => {
            let scheme = if listening.uses_tls { "https" } else { "http" };
            info!(addr = %listening.addr, port = listening.port, "{scheme} listener ready");
        }
        ServerEvent::Lookup(lookup) => {
            info!(
                ip = %lookup.ip,
                code = %lookup.geo.code,
                peer = ?lookup.request.remote_addr,
                "lookup"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let secret = resolve_secret(cli.secret.clone(), Path::new(KEY_FILE))?;
    let config = build_config(&cli, secret);

    let database = CountryDatabase::load(&cli.database)
        .with_context(|| format!("failed to load database {}", cli.database.display()))?;

    let server =
        GeoIpServer::new(config, Arc::new(database)).context("invalid server configuration")?;
    if !cli.quiet {
        server.subscribe(log_event);
    }

    let running = server.start().await;
    if !running.is_serving() {
        let reasons: Vec<String> = running.bind_errors().iter().map(ToString::to_string).collect();
        anyhow::bail!("no listener could be started: {}", reasons.join("; "));
    }

    info!(
        version = VERSION,
        lookup_path = %server.config().lookup_path,
        auth = server.config().auth_enabled(),
        cors = server.config().cors_enabled,
        "starting GeoIP server",
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received shutdown signal, draining connections");
    running.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}
