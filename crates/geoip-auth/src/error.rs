//! Authentication error types.

/// Why a request was rejected.
///
/// The `Display` form is the stable slug sent to clients in the `error`
/// field; [`AuthError::message`] is the human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Neither the `signature` query parameter nor the `x-signature` header
    /// was present.
    #[error("signature missing")]
    MissingSignature,

    /// The presented tag does not match the expected one.
    #[error("invalid signature")]
    InvalidSignature,
}

impl AuthError {
    /// Machine-readable error slug.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::MissingSignature => "signature missing",
            Self::InvalidSignature => "invalid signature",
        }
    }

    /// Human-readable explanation.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingSignature => "No signature specified in request.",
            Self::InvalidSignature => "Signature for this request is invalid.",
        }
    }
}
