//! Shared-secret request signatures for the GeoIP server.
//!
//! A client proves it knows the server's secret by sending a SHA-1 tag over a
//! canonical string built from the request's query parameters, the looked-up
//! address, and the secret itself. The tag travels in the `signature` query
//! parameter or in the `x-signature` header.
//!
//! # Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use geoip_auth::{authenticate, sign};
//! use geoip_core::IncomingRequest;
//!
//! let params: BTreeMap<String, String> = BTreeMap::new();
//! let tag = sign(&params, "8.8.8.8", "abc");
//! assert_eq!(tag, "31eb70dfd0f63982e9f5e884e9efd124e0de7365");
//!
//! let mut query = BTreeMap::new();
//! query.insert("signature".to_owned(), tag);
//! let request = IncomingRequest::builder()
//!     .ip("8.8.8.8")
//!     .query_params(query)
//!     .build();
//! assert!(authenticate(&request, Some("abc")).is_ok());
//! ```
//!
//! # Modules
//!
//! - [`codec`] - Canonical string construction and digest
//! - [`authenticator`] - Tag extraction and verification
//! - [`error`] - Authentication error types

pub mod authenticator;
pub mod codec;
pub mod error;

pub use authenticator::{SIGNATURE_HEADER, authenticate, presented_signature};
pub use codec::{SIGNATURE_PARAM, canonicalize, digest, sign};
pub use error::AuthError;
