//! Error types for the GeoIP core.

use std::path::PathBuf;

/// Core error type for configuration and database loading.
#[derive(Debug, thiserror::Error)]
pub enum GeoIpError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The database file could not be read.
    #[error("failed to read database {path}: {source}")]
    DatabaseIo {
        /// Path of the database file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of the database file could not be parsed.
    #[error("invalid database entry at line {line}: {reason}")]
    DatabaseFormat {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

/// Convenience result type for core operations.
pub type GeoIpResult<T> = Result<T, GeoIpError>;

/// Failure of the geolocation capability.
///
/// An address that is valid but simply has no record is not an error; the
/// locator reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The path segment is not an IPv4 or IPv6 address.
    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    /// The backing store failed.
    #[error("geolocation backend failure: {0}")]
    Backend(String),
}
