//! Canonical string construction and digest.
//!
//! ```text
//! canonical = { key "=" value "&" }   (sorted by key, "signature" excluded)
//!             "ip=" ip "&"
//!             "secret=" secret
//! tag       = lowercase-hex(SHA-1(canonical))
//! ```
//!
//! Values are concatenated verbatim, without escaping. A value containing
//! `&` or `=` can therefore make two different parameter sets produce the
//! same canonical string (`{a: "1&b=2"}` and `{a: "1", b: "2"}`). Existing
//! signed URLs depend on this exact format, so it is kept as is.

use sha1::{Digest, Sha1};

/// Query parameter carrying the tag; never part of the canonical string.
pub const SIGNATURE_PARAM: &str = "signature";

/// Build the canonical string for a request.
///
/// Parameters may be given in any order; they are sorted by key (byte-wise
/// ascending) before concatenation. The `signature` parameter is skipped.
///
/// # Examples
///
/// ```
/// use geoip_auth::canonicalize;
///
/// let canonical = canonicalize([("b", "2"), ("a", "1")], "1.2.3.4", "s3cr3t");
/// assert_eq!(canonical, "a=1&b=2&ip=1.2.3.4&secret=s3cr3t");
/// ```
#[must_use]
pub fn canonicalize<I, K, V>(params: I, ip: &str, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(K, V)> = params
        .into_iter()
        .filter(|(k, _)| k.as_ref() != SIGNATURE_PARAM)
        .collect();
    sorted.sort_by(|a, b| {
        a.0.as_ref()
            .cmp(b.0.as_ref())
            .then_with(|| a.1.as_ref().cmp(b.1.as_ref()))
    });

    let mut canonical = String::new();
    for (key, value) in &sorted {
        canonical.push_str(key.as_ref());
        canonical.push('=');
        canonical.push_str(value.as_ref());
        canonical.push('&');
    }
    canonical.push_str("ip=");
    canonical.push_str(ip);
    canonical.push('&');
    canonical.push_str("secret=");
    canonical.push_str(secret);
    canonical
}

/// SHA-1 of `bytes`, lowercase hex.
#[must_use]
pub fn digest(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(bytes.as_ref()))
}

/// Compute the tag a client must present: `digest(canonicalize(..))`.
#[must_use]
pub fn sign<I, K, V>(params: I, ip: &str, secret: &str) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    digest(canonicalize(params, ip, secret))
}
