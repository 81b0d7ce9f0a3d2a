use blake2::Blake2bMac;
use blake2::digest::Mac;
use blake2::digest::consts::U24;
use poly1305::Poly1305;
use poly1305::universal_hash::KeyInit;
use rand_core::{CryptoRng, RngCore};
use salsa20::XSalsa20;
use salsa20::cipher::{KeyIvInit, StreamCipher};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::MacaroonError;
use crate::{Result, keys::KEY_SIZE};

/// Size of a secretbox nonce in bytes
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

type NonceMac = Blake2bMac<U24>;

/// Authenticated encryption using XSalsa20-Poly1305.
///
/// Compatible with NaCl's `secretbox` construction: the Poly1305 subkey is
/// taken from the head of the XSalsa20 keystream, the tag is computed over
/// the ciphertext, and the sealed output is `tag || ciphertext`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBox {
    key: [u8; KEY_SIZE],
}

// Secret material: redacted Debug so the key never reaches log output.
impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

impl SecretBox {
    /// Creates a secretbox keyed with the given 32-byte key
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Creates a secretbox from a key slice
    ///
    /// # Errors
    /// Returns [`MacaroonError::InvalidKeyLength`] unless the slice is
    /// exactly 32 bytes.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| MacaroonError::InvalidKeyLength(key.len()))?;
        Ok(Self::new(key))
    }

    /// Encrypts and authenticates a plaintext under the given nonce
    ///
    /// # Returns
    /// `tag || ciphertext`, of length `plaintext.len() + TAG_SIZE`
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let mut cipher = XSalsa20::new(&self.key.into(), nonce.into());

        // The first 32 keystream bytes become the one-time Poly1305 key.
        let mut subkey = [0u8; KEY_SIZE];
        cipher.apply_keystream(&mut subkey);

        let mut out = vec![0u8; TAG_SIZE + plaintext.len()];
        out[TAG_SIZE..].copy_from_slice(plaintext);
        cipher.apply_keystream(&mut out[TAG_SIZE..]);

        let tag = Poly1305::new(poly1305::Key::from_slice(&subkey))
            .compute_unpadded(&out[TAG_SIZE..]);
        out[..TAG_SIZE].copy_from_slice(&tag);

        subkey.zeroize();
        out
    }

    /// Authenticates and decrypts a sealed message
    ///
    /// # Returns
    /// The plaintext, or `None` if the key, nonce, or ciphertext was
    /// modified. Nothing is decrypted unless the tag matches.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return None;
        }

        let mut cipher = XSalsa20::new(&self.key.into(), nonce.into());

        let mut subkey = [0u8; KEY_SIZE];
        cipher.apply_keystream(&mut subkey);

        let (tag, body) = ciphertext.split_at(TAG_SIZE);
        let computed = Poly1305::new(poly1305::Key::from_slice(&subkey)).compute_unpadded(body);
        subkey.zeroize();

        if !bool::from(computed.as_slice().ct_eq(tag)) {
            return None;
        }

        let mut plaintext = body.to_vec();
        cipher.apply_keystream(&mut plaintext);
        Some(plaintext)
    }

    /// Derives a nonce that stays unique even under a degraded random source
    ///
    /// The nonce is a Blake2b MAC keyed with the box key over `message`,
    /// salted with a random 16-byte salt and a random 16-byte
    /// personalization tag drawn from `rng`. If the random source is
    /// exhausted or broken the nonce degrades to a synthetic IV that is
    /// still unique per (key, message) pair; producing a collision would
    /// require a second-preimage attack on Blake2b.
    pub fn nonce<R>(&self, rng: &mut R, message: &[u8]) -> [u8; NONCE_SIZE]
    where
        R: RngCore + CryptoRng,
    {
        let mut salt = [0u8; 16];
        let mut personal = [0u8; 16];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut personal);

        let mut mac = NonceMac::new_with_salt_and_personal(&self.key, &salt, &personal)
            .expect("key and salts are within Blake2b limits");
        mac.update(message);
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn keyed_box(byte: u8) -> SecretBox {
        SecretBox::new([byte; KEY_SIZE])
    }

    #[test]
    fn test_from_slice_rejects_bad_length() {
        assert_eq!(
            SecretBox::from_slice(&[0u8; 16]).unwrap_err(),
            MacaroonError::InvalidKeyLength(16)
        );
        assert!(SecretBox::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_seal_open_round_trip() {
        let sbox = keyed_box(0x42);
        let nonce = [7u8; NONCE_SIZE];
        let plaintext = b"attack at dawn";

        let sealed = sbox.seal(&nonce, plaintext);
        assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);

        let opened = sbox.open(&nonce, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_seal_empty_plaintext() {
        let sbox = keyed_box(0x42);
        let nonce = [7u8; NONCE_SIZE];

        let sealed = sbox.seal(&nonce, b"");
        assert_eq!(sealed.len(), TAG_SIZE);
        assert_eq!(sbox.open(&nonce, &sealed).unwrap(), b"");
    }

    #[test]
    fn test_open_rejects_tampered_tag() {
        let sbox = keyed_box(0x42);
        let nonce = [7u8; NONCE_SIZE];

        let mut sealed = sbox.seal(&nonce, b"attack at dawn");
        sealed[0] ^= 0x01;
        assert!(sbox.open(&nonce, &sealed).is_none());
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let sbox = keyed_box(0x42);
        let nonce = [7u8; NONCE_SIZE];

        let mut sealed = sbox.seal(&nonce, b"attack at dawn");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert!(sbox.open(&nonce, &sealed).is_none());
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let nonce = [7u8; NONCE_SIZE];
        let sealed = keyed_box(0x42).seal(&nonce, b"attack at dawn");
        assert!(keyed_box(0x43).open(&nonce, &sealed).is_none());
    }

    #[test]
    fn test_open_rejects_wrong_nonce() {
        let sbox = keyed_box(0x42);
        let sealed = sbox.seal(&[7u8; NONCE_SIZE], b"attack at dawn");
        assert!(sbox.open(&[8u8; NONCE_SIZE], &sealed).is_none());
    }

    #[test]
    fn test_open_rejects_short_input() {
        let sbox = keyed_box(0x42);
        assert!(sbox.open(&[7u8; NONCE_SIZE], &[0u8; TAG_SIZE - 1]).is_none());
    }

    #[test]
    fn test_nonce_varies_per_call() {
        let sbox = keyed_box(0x42);

        let n1 = sbox.nonce(&mut OsRng, b"message");
        let n2 = sbox.nonce(&mut OsRng, b"message");
        assert_ne!(n1, n2);
    }
}
