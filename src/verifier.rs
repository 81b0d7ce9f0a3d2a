use subtle::ConstantTimeEq;

use crate::caveat::Caveat;
use crate::crypto::{SIGNATURE_SIZE, derive_key, hmac_sha256, hmac_sha256_pair, zero_key};
use crate::keys::SecretKey;
use crate::macaroon::Macaroon;
use crate::secretbox::{NONCE_SIZE, SecretBox};

/// Custom satisfaction check for a single caveat.
///
/// Closures of type `Fn(&Caveat) -> bool` implement this trait, so simple
/// predicates can be passed directly to [`Verifier::satisfy_general`].
pub trait CaveatVerifier {
    /// Returns true if the caveat's condition holds
    fn verify(&self, caveat: &Caveat) -> bool;
}

impl<F> CaveatVerifier for F
where
    F: Fn(&Caveat) -> bool,
{
    fn verify(&self, caveat: &Caveat) -> bool {
        self(caveat)
    }
}

// Why a verification step rejected; collapsed to `false` at the public
// boundary so callers cannot distinguish the cases.
#[derive(Debug)]
enum Failure {
    MissingDischarge,
    InvalidDischarge,
    UnsatisfiedCaveat,
}

/// Recomputes a macaroon's signature chain against satisfaction evidence.
///
/// Evidence comes in three forms: exact first-party caveat strings,
/// callback predicates, and bound discharge macaroons for third-party
/// caveats. The only public outcome is the boolean from
/// [`Verifier::is_valid`].
///
/// # Example
/// ```
/// use macaroon::{Macaroon, SecretKey, Verifier};
///
/// let key = SecretKey::generate();
/// let macaroon = Macaroon::builder(&key, "verifier-test", None::<String>)
///     .require("account = 3735928559")
///     .unwrap()
///     .build();
///
/// let valid = Verifier::new(&macaroon)
///     .satisfy_exact("account = 3735928559")
///     .is_valid(&key);
/// assert!(valid);
/// ```
pub struct Verifier<'a> {
    root: &'a Macaroon,
    bounded: Vec<Macaroon>,
    predicates: Vec<Vec<u8>>,
    verifiers: Vec<Box<dyn CaveatVerifier + 'a>>,
}

impl<'a> Verifier<'a> {
    /// Starts a verifier for the given macaroon with no evidence
    pub fn new(root: &'a Macaroon) -> Self {
        Self {
            root,
            bounded: Vec::new(),
            predicates: Vec::new(),
            verifiers: Vec::new(),
        }
    }

    /// Accepts a first-party caveat that byte-equals `caveat`
    pub fn satisfy_exact(mut self, caveat: impl Into<Vec<u8>>) -> Self {
        self.predicates.push(caveat.into());
        self
    }

    /// Accepts any first-party caveat for which `verifier` returns true
    pub fn satisfy_general(mut self, verifier: impl CaveatVerifier + 'a) -> Self {
        self.verifiers.push(Box::new(verifier));
        self
    }

    /// Supplies a bound discharge macaroon for third-party resolution
    pub fn satisfy_discharge(mut self, macaroon: Macaroon) -> Self {
        self.bounded.push(macaroon);
        self
    }

    /// Returns true if the macaroon is valid for the given root key
    ///
    /// Any internal failure (unsatisfied caveat, missing or unbound
    /// discharge, authentication failure on a sealed discharge key, final
    /// signature mismatch) yields `false`; which caveat rejected is never
    /// disclosed.
    pub fn is_valid(&self, key: &SecretKey) -> bool {
        match self.calculate_signature(self.root, &derive_key(key.as_bytes())) {
            Ok(signature) => {
                let valid = bool::from(signature.ct_eq(self.root.signature()));
                if !valid {
                    tracing::debug!("signature mismatch");
                }
                valid
            }
            Err(failure) => {
                tracing::debug!(?failure, "verification failed");
                false
            }
        }
    }

    // Replays the chain: first-party caveats must be satisfied by the
    // evidence, third-party caveats by a bound discharge whose own chain is
    // validated recursively.
    fn calculate_signature(
        &self,
        macaroon: &Macaroon,
        key: &[u8],
    ) -> Result<[u8; SIGNATURE_SIZE], Failure> {
        let mut signature = hmac_sha256(key, macaroon.identifier());

        for caveat in macaroon.caveats() {
            signature = match caveat.vid() {
                Some(vid) => {
                    let bound = self
                        .bounded
                        .iter()
                        .find(|m| m.identifier() == caveat.identifier())
                        .ok_or(Failure::MissingDischarge)?;
                    self.validate_bound(bound, vid, &signature)?;
                    hmac_sha256_pair(&signature, vid, caveat.identifier())
                }
                None => {
                    if !self.satisfies(caveat) {
                        return Err(Failure::UnsatisfiedCaveat);
                    }
                    hmac_sha256(&signature, caveat.identifier())
                }
            };
        }

        Ok(signature)
    }

    // Recovers the discharge key sealed inside `vid`, replays the discharge
    // macaroon's chain with it, and checks the binding to the root.
    fn validate_bound(
        &self,
        bound: &Macaroon,
        vid: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> Result<(), Failure> {
        if vid.len() < NONCE_SIZE {
            return Err(Failure::InvalidDischarge);
        }
        let (nonce, ciphertext) = vid.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().expect("split at NONCE_SIZE");

        let discharge_key = SecretBox::new(*signature)
            .open(&nonce, ciphertext)
            .ok_or(Failure::InvalidDischarge)?;

        // The recovered key is already derived; it seeds the discharge
        // chain directly.
        let recursive = self.calculate_signature(bound, &discharge_key)?;
        let bound_signature = hmac_sha256_pair(&zero_key(), self.root.signature(), &recursive);

        if bool::from(bound_signature.ct_eq(bound.signature())) {
            Ok(())
        } else {
            Err(Failure::InvalidDischarge)
        }
    }

    fn satisfies(&self, caveat: &Caveat) -> bool {
        self.predicates
            .iter()
            .any(|p| p.as_slice() == caveat.identifier())
            || self.verifiers.iter().any(|v| v.verify(caveat))
    }
}
