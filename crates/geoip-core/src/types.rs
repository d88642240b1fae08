//! Request and result types shared across crates.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Geolocation result for an address.
///
/// Serialized as the response body of a successful lookup:
///
/// ```json
/// {"ipstart":"8.8.8.0","ipend":"8.8.8.255","code":"US","name":"United States"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// First address of the matched range.
    #[serde(rename = "ipstart")]
    pub range_start: IpAddr,
    /// Last address of the matched range.
    #[serde(rename = "ipend")]
    pub range_end: IpAddr,
    /// ISO 3166-1 alpha-2 country code.
    pub code: String,
    /// Country name.
    pub name: String,
}

/// A lookup request after HTTP parsing.
///
/// One is built per request and never outlives it, except as the `request`
/// field of a [`LookupEvent`](crate::LookupEvent).
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct IncomingRequest {
    /// The `:ip` path segment, percent-decoded.
    #[builder(setter(into))]
    pub ip: String,
    /// Request path as received.
    #[builder(default, setter(into))]
    pub path: String,
    /// Decoded query parameters, keyed and iterated in ascending order.
    #[builder(default)]
    pub query_params: BTreeMap<String, String>,
    /// Value of the `x-signature` header, if any.
    #[builder(default)]
    pub signature_header: Option<String>,
    /// Peer address of the connection.
    #[builder(default)]
    pub remote_addr: Option<SocketAddr>,
}

impl IncomingRequest {
    /// Look up a single query parameter.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }
}
