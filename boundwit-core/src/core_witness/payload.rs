//! Payload entry builder

use crate::core_codec::{encode_untyped, schemas};

/// One party's payload: signed items followed by unsigned metadata
///
/// Encodes as `PAYLOAD[SIGNED_PAYLOAD[..], UNSIGNED_PAYLOAD[..]]`; only the
/// first element is covered by signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    signed: Vec<Vec<u8>>,
    unsigned: Vec<Vec<u8>>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an encoded object to the signed portion
    pub fn with_signed(mut self, item: Vec<u8>) -> Self {
        self.signed.push(item);
        self
    }

    /// Add an encoded object to the unsigned metadata
    pub fn with_unsigned(mut self, item: Vec<u8>) -> Self {
        self.unsigned.push(item);
        self
    }

    pub fn to_object(&self) -> Vec<u8> {
        encode_untyped(
            schemas::PAYLOAD,
            [
                encode_untyped(schemas::SIGNED_PAYLOAD, &self.signed),
                encode_untyped(schemas::UNSIGNED_PAYLOAD, &self.unsigned),
            ],
        )
    }
}
