//! The geolocation capability.

use std::net::IpAddr;
use std::sync::Arc;

use crate::error::LookupError;
use crate::types::GeoRecord;

/// Resolves an address to a [`GeoRecord`].
///
/// Implementations are called inline from the request pipeline and must be
/// cheap: an in-memory table, not a network round trip.
pub trait GeoLocator: Send + Sync {
    /// Resolve `ip`. `Ok(None)` means the address is valid but has no record
    /// (private, reserved, or simply unknown ranges).
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>, LookupError>;

    /// Parse and resolve a textual address.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidAddress`] when `ip` is not an IPv4 or
    /// IPv6 address.
    fn lookup_str(&self, ip: &str) -> Result<Option<GeoRecord>, LookupError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| LookupError::InvalidAddress(ip.to_owned()))?;
        self.lookup(addr)
    }
}

impl<T: GeoLocator + ?Sized> GeoLocator for Arc<T> {
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>, LookupError> {
        (**self).lookup(ip)
    }
}
