//! CORS negotiation for the lookup endpoint.
//!
//! Only the lookup path is CORS-aware. When enabled, every response on that
//! path carries the configured origin and the single allowed method, and an
//! `OPTIONS` preflight is answered directly with 200 and an empty body.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};

use geoip_core::{GeoIpError, GeoIpResult, ServerConfig};

/// The one method the lookup endpoint serves.
pub const ALLOWED_METHODS: &str = "GET";

/// Result of CORS negotiation for a single request.
#[derive(Debug, Clone, Default)]
pub struct CorsOutcome {
    /// Headers to attach to the response.
    pub headers: HeaderMap,
    /// When set, the request is answered with this status and no body.
    pub short_circuit: Option<StatusCode>,
}

impl CorsOutcome {
    /// Copy the negotiated headers onto a response.
    pub fn apply<B>(&self, response: &mut http::Response<B>) {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}

/// Decides CORS headers from the server configuration.
#[derive(Debug, Clone)]
pub struct CorsNegotiator {
    allow_origin: Option<HeaderValue>,
}

impl CorsNegotiator {
    /// Build a negotiator. CORS is off unless `config.cors_enabled`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::Config`] when the origin is not a valid header
    /// value.
    pub fn new(config: &ServerConfig) -> GeoIpResult<Self> {
        let allow_origin = if config.cors_enabled {
            let value = HeaderValue::from_str(&config.cors_origin).map_err(|e| {
                GeoIpError::Config(format!("invalid CORS origin {:?}: {e}", config.cors_origin))
            })?;
            Some(value)
        } else {
            None
        };
        Ok(Self { allow_origin })
    }

    /// Whether CORS headers are emitted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.allow_origin.is_some()
    }

    /// Negotiate headers for a request on the lookup path.
    #[must_use]
    pub fn negotiate(&self, method: &Method, request_headers: &HeaderMap) -> CorsOutcome {
        let Some(origin) = &self.allow_origin else {
            return CorsOutcome::default();
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }

        let short_circuit = (*method == Method::OPTIONS).then_some(StatusCode::OK);

        CorsOutcome {
            headers,
            short_circuit,
        }
    }
}
