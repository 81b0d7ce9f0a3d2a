use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::caveat::Caveat;
use crate::crypto::{SIGNATURE_SIZE, derive_key, hmac_sha256, hmac_sha256_pair, zero_key};
use crate::error::MacaroonError;
use crate::keys::SecretKey;
use crate::predicate::Predicate;
use crate::secretbox::SecretBox;
use crate::verifier::Verifier;
use crate::{Result, serialization};

/// Maximum size of a caveat identifier in bytes
pub const MAX_CAVEAT_SIZE: usize = 32768;

/// Maximum number of caveats on a single macaroon
pub const MAX_CAVEATS: usize = 65536;

/// A macaroon is a bearer token whose authority can be narrowed by
/// appending caveats, each folded into a chained HMAC-SHA256 signature.
///
/// Macaroons are immutable: attenuation goes through [`Macaroon::extend`]
/// and produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macaroon {
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_SIZE],
}

impl Macaroon {
    /// Starts a builder for a fresh macaroon
    ///
    /// The initial signature is `HMAC(derive_key(key), identifier)`.
    ///
    /// # Example
    /// ```
    /// use macaroon::{Macaroon, SecretKey};
    ///
    /// let key = SecretKey::generate();
    /// let macaroon = Macaroon::builder(&key, "user-12345", Some("http://mybank/"))
    ///     .require("account = 3735928559")
    ///     .unwrap()
    ///     .build();
    /// assert_eq!(macaroon.caveats().len(), 1);
    /// ```
    pub fn builder(
        key: &SecretKey,
        identifier: impl Into<Vec<u8>>,
        location: Option<impl Into<String>>,
    ) -> Builder {
        let identifier = identifier.into();
        let signature = hmac_sha256(&derive_key(key.as_bytes()), &identifier);

        Builder {
            location: location.map(Into::into),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    /// Starts a builder seeded from this macaroon (copy-and-extend)
    ///
    /// The new builder carries this macaroon's location, identifier,
    /// caveats, and signature; appending caveats attenuates the copy.
    pub fn extend(&self) -> Builder {
        Builder {
            location: self.location.clone(),
            identifier: self.identifier.clone(),
            caveats: self.caveats.clone(),
            signature: self.signature,
        }
    }

    pub(crate) fn from_parts(
        location: Option<String>,
        identifier: Vec<u8>,
        caveats: Vec<Caveat>,
        signature: [u8; SIGNATURE_SIZE],
    ) -> Self {
        Self {
            location,
            identifier,
            caveats,
            signature,
        }
    }

    /// Optional location hint for the target service
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Public identifier of this macaroon
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Caveats in chain order
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// The 32-byte chain signature
    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    /// Serializes this macaroon into the canonical wire envelope
    ///
    /// The output is plain ASCII: a version-2 binary layout wrapped in
    /// URL-safe base64 without padding.
    pub fn serialize(&self) -> Vec<u8> {
        serialization::serialize(self)
    }

    /// Decodes a macaroon from its canonical wire envelope
    ///
    /// # Errors
    /// Returns [`MacaroonError::WireFormat`] on malformed, truncated, or
    /// wrong-version input.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        serialization::deserialize(data)
    }

    /// Verifies this macaroon with no satisfaction evidence
    ///
    /// Succeeds only for a caveat-free macaroon minted under `key`; any
    /// caveat needs evidence supplied through a [`Verifier`].
    pub fn verify(&self, key: &SecretKey) -> bool {
        Verifier::new(self).is_valid(key)
    }
}

impl std::fmt::Display for Macaroon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "location {}", self.location.as_deref().unwrap_or(""))?;
        writeln!(
            f,
            "identifier {}",
            String::from_utf8_lossy(&self.identifier)
        )?;
        for caveat in &self.caveats {
            writeln!(f, "{caveat}")?;
        }
        write!(f, "signature {}", hex::encode(self.signature))
    }
}

/// Single-owner accumulator that assembles a [`Macaroon`].
///
/// Every attenuation folds into the running signature, so the order of
/// `require` calls is significant.
#[derive(Debug, Clone)]
pub struct Builder {
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_SIZE],
}

impl Builder {
    /// Appends a first-party caveat
    ///
    /// Chains `signature = HMAC(signature, caveat)`.
    ///
    /// # Errors
    /// [`MacaroonError::CaveatTooLarge`] if the caveat reaches 32768 bytes,
    /// [`MacaroonError::TooManyCaveats`] at the 65536-caveat cap.
    pub fn require(mut self, caveat: impl Into<Vec<u8>>) -> Result<Self> {
        let identifier = caveat.into();
        self.check_capacity(&identifier)?;

        self.signature = hmac_sha256(&self.signature, &identifier);
        self.caveats.push(Caveat::first_party(identifier));
        Ok(self)
    }

    /// Appends a first-party comparison caveat built with the predicate DSL
    pub fn require_predicate(self, predicate: &Predicate) -> Result<Self> {
        self.require(predicate.to_string())
    }

    /// Appends a third-party caveat, sealing the discharge key for `location`
    ///
    /// Draws nonce randomness from the operating system.
    pub fn require_third_party(
        self,
        location: impl Into<String>,
        key: &SecretKey,
        identifier: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        self.require_third_party_with(&mut OsRng, location, key, identifier)
    }

    /// Appends a third-party caveat using the supplied random source
    ///
    /// The derived discharge key is sealed under the current chain
    /// signature; a verifier can recover it only after recomputing the
    /// chain up to this caveat. The verification id is `nonce || sealed`.
    pub fn require_third_party_with<R>(
        mut self,
        rng: &mut R,
        location: impl Into<String>,
        key: &SecretKey,
        identifier: impl Into<Vec<u8>>,
    ) -> Result<Self>
    where
        R: RngCore + CryptoRng,
    {
        let identifier = identifier.into();
        self.check_capacity(&identifier)?;

        let derived = derive_key(key.as_bytes());
        let sbox = SecretBox::new(self.signature);
        let nonce = sbox.nonce(rng, &derived);
        let sealed = sbox.seal(&nonce, &derived);

        let mut vid = Vec::with_capacity(nonce.len() + sealed.len());
        vid.extend_from_slice(&nonce);
        vid.extend_from_slice(&sealed);

        self.signature = hmac_sha256_pair(&self.signature, &vid, &identifier);
        self.caveats
            .push(Caveat::third_party(identifier, location, vid));
        Ok(self)
    }

    /// Binds a discharge macaroon to the chain accumulated so far
    ///
    /// Overwrites the builder's location, identifier, and caveats with the
    /// discharge macaroon's and sets
    /// `signature = HMAC2(0, signature, discharge.signature)`, tying the
    /// discharge to this specific root chain so it cannot be replayed
    /// against another macaroon.
    pub fn bind(mut self, macaroon: &Macaroon) -> Self {
        self.location = macaroon.location.clone();
        self.identifier = macaroon.identifier.clone();
        self.caveats = macaroon.caveats.clone();
        self.signature = hmac_sha256_pair(&zero_key(), &self.signature, &macaroon.signature);
        self
    }

    /// Freezes the accumulated state into an immutable macaroon
    pub fn build(self) -> Macaroon {
        Macaroon {
            location: self.location,
            identifier: self.identifier,
            caveats: self.caveats,
            signature: self.signature,
        }
    }

    fn check_capacity(&self, identifier: &[u8]) -> Result<()> {
        if identifier.len() >= MAX_CAVEAT_SIZE {
            return Err(MacaroonError::CaveatTooLarge(identifier.len()));
        }
        if self.caveats.len() >= MAX_CAVEATS {
            return Err(MacaroonError::TooManyCaveats);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretKey {
        SecretKey::generate()
    }

    #[test]
    fn test_mint_macaroon() {
        let key = secret();
        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder")).build();

        assert_eq!(macaroon.location(), Some("macaroon/builder"));
        assert_eq!(macaroon.identifier(), b"macaroon-test");
        assert!(macaroon.caveats().is_empty());
        assert_eq!(macaroon.signature().len(), SIGNATURE_SIZE);
    }

    #[test]
    fn test_mint_is_deterministic() {
        let key = secret();

        let m1 = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder")).build();
        let m2 = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder")).build();

        assert_eq!(m1, m2);
    }

    #[test]
    fn test_mint_without_location() {
        let key = secret();
        let macaroon = Macaroon::builder(&key, "macaroon-test", None::<String>).build();

        assert_eq!(macaroon.location(), None);
    }

    #[test]
    fn test_add_first_party_caveat() {
        let key = secret();
        let plain = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder")).build();

        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .build();

        assert_eq!(
            macaroon.caveats(),
            &[Caveat::first_party(b"account = 3735928559".as_slice())]
        );
        assert_ne!(macaroon.signature(), plain.signature());
    }

    #[test]
    fn test_supports_many_first_party_caveats() {
        let key = secret();
        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .require("time < 2015-01-01T00:00")
            .unwrap()
            .require("email = alice@example.org")
            .unwrap()
            .build();

        let identifiers: Vec<_> = macaroon
            .caveats()
            .iter()
            .map(|c| c.identifier_str().unwrap())
            .collect();
        assert_eq!(
            identifiers,
            [
                "account = 3735928559",
                "time < 2015-01-01T00:00",
                "email = alice@example.org"
            ]
        );
    }

    #[test]
    fn test_caveat_order_changes_signature() {
        let key = secret();

        let ab = Macaroon::builder(&key, "macaroon-test", None::<String>)
            .require("a")
            .unwrap()
            .require("b")
            .unwrap()
            .build();
        let ba = Macaroon::builder(&key, "macaroon-test", None::<String>)
            .require("b")
            .unwrap()
            .require("a")
            .unwrap()
            .build();

        assert_ne!(ab.signature(), ba.signature());
    }

    #[test]
    fn test_extend_preserves_chain() {
        let key = secret();
        let base = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .build();

        let extended = base.extend().require("action = read").unwrap().build();

        assert_eq!(extended.location(), base.location());
        assert_eq!(extended.identifier(), base.identifier());
        assert_eq!(extended.caveats().len(), 2);

        // Extending step by step equals building in one go.
        let direct = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .require("action = read")
            .unwrap()
            .build();
        assert_eq!(extended, direct);
    }

    #[test]
    fn test_add_third_party_caveat() {
        let key = secret();
        let third_party_key = secret();

        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .require_third_party(
                "http://auth.mybank/",
                &third_party_key,
                "this was how we remind auth of key/pred",
            )
            .unwrap()
            .build();

        let caveat = &macaroon.caveats()[1];
        assert!(caveat.is_third_party());
        assert_eq!(
            caveat.identifier_str(),
            Some("this was how we remind auth of key/pred")
        );
        assert_eq!(caveat.location(), Some("http://auth.mybank/"));
        // nonce (24) + tag (16) + 32-byte derived key
        assert_eq!(caveat.vid().unwrap().len(), 72);
    }

    #[test]
    fn test_third_party_vid_is_randomized() {
        let key = secret();
        let third_party_key = secret();

        let build = || {
            Macaroon::builder(&key, "macaroon-test", None::<String>)
                .require_third_party("http://auth.mybank/", &third_party_key, "third-party")
                .unwrap()
                .build()
        };

        let m1 = build();
        let m2 = build();

        // Fresh nonce salts per call: same inputs, different vid and chain.
        assert_ne!(m1.caveats()[0].vid(), m2.caveats()[0].vid());
        assert_ne!(m1.signature(), m2.signature());
    }

    #[test]
    fn test_bind_discharge() {
        let key = secret();
        let third_party_key = secret();

        let root = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require_third_party("http://auth.mybank/", &third_party_key, "third-party")
            .unwrap()
            .build();

        let discharge =
            Macaroon::builder(&third_party_key, "third-party", Some("http://auth.mybank/"))
                .require("action = read")
                .unwrap()
                .build();

        let bound = root.extend().bind(&discharge).build();

        assert_eq!(bound.identifier(), discharge.identifier());
        assert_eq!(bound.location(), discharge.location());
        assert_eq!(bound.caveats(), discharge.caveats());
        assert_ne!(bound.signature(), discharge.signature());
    }

    #[test]
    fn test_rejects_oversized_caveat() {
        let key = secret();
        let huge = vec![b'x'; MAX_CAVEAT_SIZE];

        let result = Macaroon::builder(&key, "macaroon-test", None::<String>).require(huge);

        assert_eq!(
            result.unwrap_err(),
            MacaroonError::CaveatTooLarge(MAX_CAVEAT_SIZE)
        );
    }

    #[test]
    fn test_rejects_oversized_third_party_identifier() {
        let key = secret();
        let huge = vec![b'x'; MAX_CAVEAT_SIZE];

        let result = Macaroon::builder(&key, "macaroon-test", None::<String>).require_third_party(
            "http://auth.mybank/",
            &secret(),
            huge,
        );

        assert_eq!(
            result.unwrap_err(),
            MacaroonError::CaveatTooLarge(MAX_CAVEAT_SIZE)
        );
    }

    #[test]
    fn test_rejects_too_many_caveats() {
        let key = secret();
        let mut builder = Macaroon::builder(&key, "macaroon-test", None::<String>);

        for i in 0..MAX_CAVEATS {
            builder = builder.require(format!("caveat {i}")).unwrap();
        }

        let result = builder.require("one too many");
        assert_eq!(result.unwrap_err(), MacaroonError::TooManyCaveats);
    }

    #[test]
    fn test_serde_round_trip() {
        let key = secret();
        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .require_third_party("http://auth.mybank/", &secret(), "third-party")
            .unwrap()
            .build();

        let json = serde_json::to_string(&macaroon).unwrap();
        let parsed: Macaroon = serde_json::from_str(&json).unwrap();

        assert_eq!(macaroon, parsed);
    }

    #[test]
    fn test_display_renders_inspection_form() {
        let key = SecretKey::from([0u8; 32]);
        let macaroon = Macaroon::builder(&key, "macaroon-test", Some("macaroon/builder"))
            .require("account = 3735928559")
            .unwrap()
            .build();

        let rendered = macaroon.to_string();
        assert!(rendered.starts_with("location macaroon/builder\n"));
        assert!(rendered.contains("identifier macaroon-test\n"));
        assert!(rendered.contains("cid account = 3735928559\n"));
        assert!(rendered.contains(&format!("signature {}", hex::encode(macaroon.signature()))));
    }
}
