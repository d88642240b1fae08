//! Request tag extraction and verification.

use subtle::ConstantTimeEq;
use tracing::debug;

use geoip_core::IncomingRequest;

use crate::codec::{SIGNATURE_PARAM, sign};
use crate::error::AuthError;

/// Header accepted as an alternative to the `signature` query parameter.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// The tag presented by the client.
///
/// The `signature` query parameter wins; the `x-signature` header is the
/// fallback. Empty values count as absent.
#[must_use]
pub fn presented_signature(request: &IncomingRequest) -> Option<&str> {
    request
        .query(SIGNATURE_PARAM)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            request
                .signature_header
                .as_deref()
                .filter(|s| !s.is_empty())
        })
}

/// Verify a request against the configured secret.
///
/// With no secret every request is accepted.
///
/// # Errors
///
/// Returns [`AuthError::MissingSignature`] when no tag was presented and
/// [`AuthError::InvalidSignature`] when the tag does not match.
pub fn authenticate(request: &IncomingRequest, secret: Option<&str>) -> Result<(), AuthError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let provided = presented_signature(request).ok_or(AuthError::MissingSignature)?;
    let expected = sign(&request.query_params, &request.ip, secret);

    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        debug!(ip = %request.ip, "signature verified");
        Ok(())
    } else {
        debug!(ip = %request.ip, provided = %provided, "signature mismatch");
        Err(AuthError::InvalidSignature)
    }
}
