use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// A caveat restricts the authority granted by a macaroon.
///
/// First-party caveats are checked by the target service itself;
/// third-party caveats carry a verification id and must be discharged by an
/// external authority. Equality is structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    identifier: Vec<u8>,
    location: Option<String>,
    vid: Option<Vec<u8>>,
}

impl Caveat {
    /// Creates a first-party caveat
    pub fn first_party(identifier: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            location: None,
            vid: None,
        }
    }

    /// Creates a third-party caveat
    pub fn third_party(
        identifier: impl Into<Vec<u8>>,
        location: impl Into<String>,
        vid: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            location: Some(location.into()),
            vid: Some(vid.into()),
        }
    }

    // Decoder-side constructor: the wire format allows location and vid
    // independently of each other.
    pub(crate) fn from_parts(
        identifier: Vec<u8>,
        location: Option<String>,
        vid: Option<Vec<u8>>,
    ) -> Self {
        Self {
            identifier,
            location,
            vid,
        }
    }

    /// The caveat identifier, opaque to the signature engine
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// The identifier as UTF-8, if it is valid UTF-8
    pub fn identifier_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.identifier).ok()
    }

    /// Location hint of the discharging authority, for third-party caveats
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The sealed verification id, present only on third-party caveats
    pub fn vid(&self) -> Option<&[u8]> {
        self.vid.as_deref()
    }

    /// Returns true if this caveat is checked by the target service
    pub fn is_first_party(&self) -> bool {
        self.vid.is_none()
    }

    /// Returns true if this caveat requires a discharge macaroon
    pub fn is_third_party(&self) -> bool {
        self.vid.is_some()
    }
}

impl std::fmt::Display for Caveat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cid {}", String::from_utf8_lossy(&self.identifier))?;
        if let Some(vid) = &self.vid {
            write!(f, "\nvid {}", URL_SAFE_NO_PAD.encode(vid))?;
        }
        if let Some(location) = &self.location {
            write!(f, "\ncl  {location}")?;
        }
        Ok(())
    }
}
