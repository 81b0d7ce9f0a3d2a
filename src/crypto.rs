use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Size of an HMAC-SHA256 output in bytes (32 bytes = 256 bits)
pub const SIGNATURE_SIZE: usize = 32;

/// Domain separator for root-key derivation. Fixed for wire interoperability.
const KEY_GENERATOR: &[u8] = b"macaroon-key-generator";

/// Generates an HMAC-SHA256 signature
///
/// # Arguments
/// * `key` - The secret key
/// * `message` - The message to authenticate
///
/// # Returns
/// A 32-byte HMAC signature
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Combines two variable-length fields into one chain step
///
/// This computes: `HMAC(key, HMAC(key, a) || HMAC(key, b))`, which fixes the
/// size of both inputs before concatenation and so avoids length-prefix
/// ambiguity between `a` and `b`.
pub fn hmac_sha256_pair(key: &[u8], a: &[u8], b: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let mut combined = [0u8; SIGNATURE_SIZE * 2];
    combined[..SIGNATURE_SIZE].copy_from_slice(&hmac_sha256(key, a));
    combined[SIGNATURE_SIZE..].copy_from_slice(&hmac_sha256(key, b));
    hmac_sha256(key, &combined)
}

/// Derives a 32-byte chain key from an arbitrary-length root secret
///
/// The root secret is never used directly as a chain key.
pub fn derive_key(root: &[u8]) -> [u8; SIGNATURE_SIZE] {
    hmac_sha256(KEY_GENERATOR, root)
}

/// The all-zero key used by the discharge-binding transform
pub(crate) fn zero_key() -> [u8; SIGNATURE_SIZE] {
    [0u8; SIGNATURE_SIZE]
}
