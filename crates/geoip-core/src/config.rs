//! Server configuration.
//!
//! [`ServerConfig`] is built once (through its typed builder or
//! [`ServerConfig::default`]), validated with [`ServerConfig::validate`], and
//! then shared read-only by every listener and request.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{GeoIpError, GeoIpResult};
use crate::template::PathTemplate;

/// Default lookup path template.
pub const DEFAULT_LOOKUP_PATH: &str = "/location/:ip";
/// Default allowed CORS origin.
pub const DEFAULT_CORS_ORIGIN: &str = "*";
/// Default plain HTTP port.
pub const DEFAULT_PORT: u16 = 8888;
/// Default HTTPS port.
pub const DEFAULT_TLS_PORT: u16 = 4443;

/// TLS listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// PEM private key file.
    pub key_path: PathBuf,
    /// PEM certificate chain file.
    pub cert_path: PathBuf,
    /// Extra PEM CA certificates appended to the served chain.
    #[builder(default)]
    #[serde(default)]
    pub ca_paths: Vec<PathBuf>,
    /// Port of the TLS listener.
    #[builder(default = DEFAULT_TLS_PORT)]
    #[serde(default = "default_tls_port")]
    pub port: u16,
}

fn default_tls_port() -> u16 {
    DEFAULT_TLS_PORT
}

/// GeoIP server configuration.
///
/// # Examples
///
/// ```
/// use geoip_core::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .secret_key(Some("abc".to_owned()))
///     .cors_enabled(true)
///     .build();
/// assert_eq!(config.lookup_path, "/location/:ip");
/// assert_eq!(config.listen_port, 8888);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Shared secret for request signatures. `None` disables authentication.
    #[builder(default)]
    #[serde(skip_serializing, default)]
    pub secret_key: Option<String>,

    /// Lookup path template with a single `:ip` segment.
    #[builder(default = String::from(DEFAULT_LOOKUP_PATH))]
    pub lookup_path: String,

    /// Whether CORS headers are emitted and preflights answered.
    #[builder(default = false)]
    pub cors_enabled: bool,

    /// Value of `Access-Control-Allow-Origin`.
    #[builder(default = String::from(DEFAULT_CORS_ORIGIN))]
    pub cors_origin: String,

    /// Host both listeners bind to.
    #[builder(default = String::from("0.0.0.0"))]
    pub listen_host: String,

    /// Port of the plain HTTP listener.
    #[builder(default = DEFAULT_PORT)]
    pub listen_port: u16,

    /// TLS listener settings; `None` runs plain HTTP only.
    #[builder(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("lookup_path", &self.lookup_path)
            .field("cors_enabled", &self.cors_enabled)
            .field("cors_origin", &self.cors_origin)
            .field("listen_host", &self.listen_host)
            .field("listen_port", &self.listen_port)
            .field("tls", &self.tls)
            .finish()
    }
}

impl ServerConfig {
    /// Check the configuration for values that cannot be served.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::Config`] when the lookup path is not a valid
    /// template, the secret is empty, the CORS origin is not a valid header
    /// value, or the TLS listener would share the plain listener's port.
    pub fn validate(&self) -> GeoIpResult<()> {
        PathTemplate::parse(&self.lookup_path)?;

        if self.secret_key.as_deref().is_some_and(str::is_empty) {
            return Err(GeoIpError::Config(
                "secret key must not be empty".to_owned(),
            ));
        }

        if self.cors_origin.is_empty()
            || self
                .cors_origin
                .bytes()
                .any(|b| b.is_ascii_control() || !b.is_ascii())
        {
            return Err(GeoIpError::Config(format!(
                "invalid CORS origin: {:?}",
                self.cors_origin
            )));
        }

        if let Some(tls) = &self.tls {
            if tls.port != 0 && tls.port == self.listen_port {
                return Err(GeoIpError::Config(format!(
                    "TLS port {} must differ from the plain port",
                    tls.port
                )));
            }
        }

        Ok(())
    }

    /// The parsed lookup path template.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::Config`] when the template is malformed.
    pub fn lookup_template(&self) -> GeoIpResult<PathTemplate> {
        PathTemplate::parse(&self.lookup_path)
    }

    /// Whether requests must carry a valid signature.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        self.secret_key.is_some()
    }
}
