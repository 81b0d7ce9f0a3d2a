use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::caveat::Caveat;
use crate::crypto::SIGNATURE_SIZE;
use crate::error::MacaroonError;
use crate::macaroon::Macaroon;
use crate::Result;

/// Wire format version understood by this codec
const VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Location,
    Identifier,
    VerifierId,
    Signature,
    EndOfSection,
}

impl Field {
    fn tag(self) -> u8 {
        match self {
            Field::Location => 1,
            Field::Identifier => 2,
            Field::VerifierId => 4,
            Field::Signature => 6,
            Field::EndOfSection => 0,
        }
    }
}

/// Encodes a macaroon into the canonical envelope: a version byte, the root
/// section, the caveat sections, and the signature, all length-prefixed and
/// wrapped in URL-safe base64 without padding.
pub fn serialize(macaroon: &Macaroon) -> Vec<u8> {
    let mut encoder = Encoder::new();

    encoder.byte(VERSION);
    encoder.optional_field(Field::Location, macaroon.location().map(str::as_bytes));
    encoder.field(Field::Identifier, macaroon.identifier());
    encoder.end_of_section();

    for caveat in macaroon.caveats() {
        encoder.optional_field(Field::Location, caveat.location().map(str::as_bytes));
        encoder.field(Field::Identifier, caveat.identifier());
        encoder.optional_field(Field::VerifierId, caveat.vid());
        encoder.end_of_section();
    }

    encoder.end_of_section();
    encoder.field(Field::Signature, macaroon.signature());

    let out = URL_SAFE_NO_PAD.encode(encoder.buf).into_bytes();
    tracing::trace!(bytes = out.len(), "serialized macaroon");
    out
}

/// Decodes a macaroon from its canonical envelope.
///
/// Rejects, never repairs: wrong version, missing identifier or signature,
/// a signature that is not 32 bytes, unrecognized tags, and truncated or
/// trailing input all fail with [`MacaroonError::WireFormat`].
pub fn deserialize(data: &[u8]) -> Result<Macaroon> {
    let raw = URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|e| MacaroonError::WireFormat(format!("invalid base64: {e}")))?;
    let mut decoder = Decoder::new(&raw);

    let version = decoder.read_byte()?;
    if version != VERSION {
        return Err(MacaroonError::WireFormat(format!(
            "unsupported version {version}"
        )));
    }

    let location = decoder.read_string(Field::Location)?;
    let identifier = decoder
        .read_bytes(Field::Identifier)?
        .ok_or_else(|| MacaroonError::WireFormat("missing identifier".into()))?;
    decoder.expect_end_of_section()?;

    let mut caveats = Vec::new();
    while decoder.peek_byte()? != Field::EndOfSection.tag() {
        let caveat_location = decoder.read_string(Field::Location)?;
        let caveat_identifier = decoder
            .read_bytes(Field::Identifier)?
            .ok_or_else(|| MacaroonError::WireFormat("missing caveat identifier".into()))?;
        let vid = decoder.read_bytes(Field::VerifierId)?;
        decoder.expect_end_of_section()?;
        caveats.push(Caveat::from_parts(caveat_identifier, caveat_location, vid));
    }
    decoder.expect_end_of_section()?;

    let signature = decoder
        .read_bytes(Field::Signature)?
        .ok_or_else(|| MacaroonError::WireFormat("missing signature".into()))?;
    let signature: [u8; SIGNATURE_SIZE] = signature.as_slice().try_into().map_err(|_| {
        MacaroonError::WireFormat(format!("signature must be 32 bytes, got {}", signature.len()))
    })?;

    if !decoder.at_end() {
        return Err(MacaroonError::WireFormat("trailing data".into()));
    }

    Ok(Macaroon::from_parts(
        location, identifier, caveats, signature,
    ))
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    // Little-endian base-128: low seven bits per byte, high bit set while
    // more bytes follow.
    fn varint(&mut self, mut value: usize) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn field(&mut self, field: Field, value: &[u8]) {
        self.byte(field.tag());
        self.varint(value.len());
        self.buf.extend_from_slice(value);
    }

    fn optional_field(&mut self, field: Field, value: Option<&[u8]>) {
        if let Some(value) = value {
            self.field(field, value);
        }
    }

    fn end_of_section(&mut self) {
        self.byte(Field::EndOfSection.tag());
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| MacaroonError::WireFormat("truncated input".into()))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Ok(b)
    }

    fn read_varint(&mut self) -> Result<usize> {
        let mut result: u64 = 0;
        let mut shift = 0u32;
        loop {
            let b = self.read_byte()?;
            if shift >= 63 {
                return Err(MacaroonError::WireFormat("varint is too long".into()));
            }
            result |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result as usize)
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.data.len() - self.pos {
            return Err(MacaroonError::WireFormat("truncated input".into()));
        }
        let slice = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok(slice)
    }

    // Reads the payload of `field` if it is next, leaving the cursor
    // untouched otherwise.
    fn read_bytes(&mut self, field: Field) -> Result<Option<Vec<u8>>> {
        if self.peek_byte()? != field.tag() {
            return Ok(None);
        }
        self.pos += 1;
        let length = self.read_varint()?;
        Ok(Some(self.take(length)?.to_vec()))
    }

    fn read_string(&mut self, field: Field) -> Result<Option<String>> {
        match self.read_bytes(field)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| MacaroonError::WireFormat("location is not valid UTF-8".into())),
            None => Ok(None),
        }
    }

    fn expect_end_of_section(&mut self) -> Result<()> {
        if self.read_byte()? != Field::EndOfSection.tag() {
            return Err(MacaroonError::WireFormat("expected end of section".into()));
        }
        Ok(())
    }
}
