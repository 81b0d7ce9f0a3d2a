use curve25519_dalek::MontgomeryPoint;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use salsa20::cipher::consts::U10;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::MacaroonError;

/// Size of every key in bytes
pub const KEY_SIZE: usize = 32;

/// A 32-byte secret key, used as a macaroon root key or a discharge key.
///
/// The key material is zeroed on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

/// A 32-byte Curve25519 private key for out-of-band discharge-key exchange.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_SIZE]);

/// A 32-byte Curve25519 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Generates a secret key from the operating system's random source
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generates a secret key from the supplied random source
    pub fn generate_with<R>(rng: &mut R) -> Self
    where
        R: RngCore + CryptoRng,
    {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PrivateKey {
    /// Generates a clamped Curve25519 private key from the operating
    /// system's random source
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generates a clamped Curve25519 private key from the supplied
    /// random source
    pub fn generate_with<R>(rng: &mut R) -> Self
    where
        R: RngCore + CryptoRng,
    {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        bytes[0] &= 248;
        bytes[31] &= 127;
        bytes[31] |= 64;
        Self(bytes)
    }

    /// Returns the Curve25519 public key matching this private key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(MontgomeryPoint::mul_base_clamped(self.0).to_bytes())
    }

    /// Returns the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PublicKey {
    /// Returns the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Calculates the X25519/HSalsa20 shared secret for a key pair
///
/// The result matches NaCl's `crypto_box_beforenm`: an X25519 scalar
/// multiplication whose output is run through HSalsa20 with a zero block,
/// re-calculable only by the two key holders.
pub fn shared_secret(public_key: &PublicKey, private_key: &PrivateKey) -> SecretKey {
    let raw = MontgomeryPoint(public_key.0).mul_clamped(private_key.0);
    let key = salsa20::hsalsa::<U10>((&raw.0).into(), (&[0u8; 16]).into());
    SecretKey(key.into())
}

macro_rules! key_conversions {
    ($name:ident) => {
        impl From<[u8; KEY_SIZE]> for $name {
            fn from(bytes: [u8; KEY_SIZE]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = MacaroonError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let bytes: [u8; KEY_SIZE] = bytes
                    .try_into()
                    .map_err(|_| MacaroonError::InvalidKeyLength(bytes.len()))?;
                Ok(Self(bytes))
            }
        }
    };
}

key_conversions!(SecretKey);
key_conversions!(PrivateKey);
key_conversions!(PublicKey);

// Secret material: redacted Debug, constant-time equality.
macro_rules! secret_key_impls {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "(..)"))
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0.ct_eq(&other.0).into()
            }
        }

        impl Eq for $name {}
    };
}

secret_key_impls!(SecretKey);
secret_key_impls!(PrivateKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_key() {
        let k1 = SecretKey::generate();
        let k2 = SecretKey::generate();

        assert_eq!(k1.as_bytes().len(), KEY_SIZE);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_try_from_rejects_bad_length() {
        assert_eq!(
            SecretKey::try_from(&[0u8; 31][..]).unwrap_err(),
            MacaroonError::InvalidKeyLength(31)
        );
        assert!(SecretKey::try_from(&[0u8; 32][..]).is_ok());
    }

    #[test]
    fn test_private_key_is_clamped() {
        let key = PrivateKey::generate();
        let bytes = key.as_bytes();

        assert_eq!(bytes[0] & 7, 0);
        assert_eq!(bytes[31] & 128, 0);
        assert_eq!(bytes[31] & 64, 64);
    }

    #[test]
    fn test_shared_secret_agreement() {
        let alice = PrivateKey::generate();
        let bob = PrivateKey::generate();

        let ab = shared_secret(&bob.public_key(), &alice);
        let ba = shared_secret(&alice.public_key(), &bob);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_shared_secret_differs_per_pair() {
        let alice = PrivateKey::generate();
        let bob = PrivateKey::generate();
        let carol = PrivateKey::generate();

        let ab = shared_secret(&bob.public_key(), &alice);
        let ac = shared_secret(&carol.public_key(), &alice);

        assert_ne!(ab, ac);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SecretKey::from([0xAA; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SecretKey(..)");
    }
}
