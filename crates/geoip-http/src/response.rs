//! Response serialization and error formatting.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

use geoip_auth::AuthError;
use geoip_core::LookupError;

/// Content type of every non-empty response.
pub const CONTENT_TYPE: &str = "application/json";

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A fully buffered response; preflights and `HEAD` answers carry an empty body.
pub type GeoIpResponse = http::Response<Full<Bytes>>;

/// An error rendered to the client.
///
/// Serialized as:
///
/// ```json
/// {"error": "invalid signature", "message": "Signature for this request is invalid."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{slug}: {message}")]
pub struct ApiError {
    /// HTTP status code.
    pub status: StatusCode,
    /// Stable machine-readable error name.
    pub slug: &'static str,
    /// Human-readable explanation.
    pub message: String,
}

impl ApiError {
    /// Create a new error.
    pub fn new(status: StatusCode, slug: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            slug,
            message: message.into(),
        }
    }

    /// No route matches the request path, or the address has no record.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found", message)
    }

    /// The lookup path was requested with an unsupported method.
    #[must_use]
    pub fn method_not_allowed(method: &http::Method) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed",
            format!("Method {method} is not supported."),
        )
    }

    /// Unexpected server-side failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error", message)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.slug(), err.message())
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::InvalidAddress(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid ip", err.to_string())
            }
            LookupError::Backend(_) => Self::internal(err.to_string()),
        }
    }
}

/// Serialize an error into its JSON body.
#[must_use]
pub fn error_to_json(error: &ApiError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "error": error.slug,
        "message": error.message,
    }))
    .expect("JSON serialization of error cannot fail")
}

/// Convert an [`ApiError`] into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &ApiError, request_id: &str) -> GeoIpResponse {
    http::Response::builder()
        .status(error.status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id)
        .body(Full::new(Bytes::from(error_to_json(error))))
        .expect("valid error response")
}

/// Build a 200 response from JSON bytes.
#[must_use]
pub fn json_response(json: Vec<u8>, request_id: &str) -> GeoIpResponse {
    http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id)
        .body(Full::new(Bytes::from(json)))
        .expect("valid JSON response")
}

/// Build a bodiless response.
#[must_use]
pub fn empty_response(status: StatusCode, request_id: &str) -> GeoIpResponse {
    http::Response::builder()
        .status(status)
        .header(REQUEST_ID_HEADER, request_id)
        .body(Full::new(Bytes::new()))
        .expect("valid empty response")
}
