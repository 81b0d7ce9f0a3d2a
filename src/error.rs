use thiserror::Error;

/// Errors that can occur when building or decoding macaroons.
///
/// Verification failures are deliberately absent: `Verifier::is_valid`
/// collapses every internal failure to `false` so a caller probing a token
/// cannot learn which caveat rejected it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MacaroonError {
    /// A key was not exactly 32 bytes long
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A caveat identifier exceeded the per-caveat size cap
    #[error("caveat is too large: {0} bytes")]
    CaveatTooLarge(usize),

    /// The macaroon already carries the maximum number of caveats
    #[error("too many caveats")]
    TooManyCaveats,

    /// Malformed, truncated, or wrong-version serialized input
    #[error("invalid wire format: {0}")]
    WireFormat(String),
}
