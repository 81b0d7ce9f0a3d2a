//! Macaroons: bearer tokens whose authority is narrowed by caveats and
//! protected by a chained HMAC-SHA256 signature, with third-party caveats
//! discharged via authenticated encryption.

pub mod caveat;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod macaroon;
pub mod predicate;
pub mod secretbox;
pub mod serialization;
pub mod verifier;

pub use caveat::Caveat;
pub use error::MacaroonError;
pub use keys::{PrivateKey, PublicKey, SecretKey, shared_secret};
pub use macaroon::{Builder, Macaroon};
pub use verifier::{CaveatVerifier, Verifier};

/// Result type for macaroon operations
pub type Result<T> = std::result::Result<T, MacaroonError>;
