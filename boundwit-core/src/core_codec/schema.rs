//! Object schemas and header encoding
//!
//! Every object starts with two header bytes: a catalogue byte and a schema id.
//!
//! ```text
//!  catalogue byte
//!  ┌───┬───┬───┬───┬───────────────┐
//!  │ 7 │ 6 │ 5 │ 4 │    3 .. 0     │
//!  └───┴───┴───┴───┴───────────────┘
//!   size      │   │     unused
//!   width     │   └── typed (items share one header)
//!             └────── iterable (value holds sub-objects)
//! ```
//!
//! Size width bits: `00` = 1 byte, `01` = 2, `10` = 4, `11` = 8 (big-endian).

const ITERABLE_FLAG: u8 = 0x20;
const TYPED_FLAG: u8 = 0x10;

/// Width of an object's size field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeWidth {
    One,
    Two,
    Four,
    Eight,
}

impl SizeWidth {
    /// Number of bytes the size field occupies
    pub fn bytes(self) -> usize {
        match self {
            SizeWidth::One => 1,
            SizeWidth::Two => 2,
            SizeWidth::Four => 4,
            SizeWidth::Eight => 8,
        }
    }

    /// Smallest width able to hold `value_len` plus the size field itself
    pub fn for_value_len(value_len: usize) -> Self {
        let len = value_len as u64;
        if len.saturating_add(1) <= u8::MAX as u64 {
            SizeWidth::One
        } else if len.saturating_add(2) <= u16::MAX as u64 {
            SizeWidth::Two
        } else if len.saturating_add(4) <= u32::MAX as u64 {
            SizeWidth::Four
        } else {
            SizeWidth::Eight
        }
    }

    fn from_catalogue(catalogue: u8) -> Self {
        match catalogue >> 6 {
            0 => SizeWidth::One,
            1 => SizeWidth::Two,
            2 => SizeWidth::Four,
            _ => SizeWidth::Eight,
        }
    }

    fn catalogue_bits(self) -> u8 {
        match self {
            SizeWidth::One => 0x00,
            SizeWidth::Two => 0x40,
            SizeWidth::Four => 0x80,
            SizeWidth::Eight => 0xC0,
        }
    }

    pub(crate) fn write(self, size: u64, out: &mut Vec<u8>) {
        match self {
            SizeWidth::One => out.push(size as u8),
            SizeWidth::Two => out.extend_from_slice(&(size as u16).to_be_bytes()),
            SizeWidth::Four => out.extend_from_slice(&(size as u32).to_be_bytes()),
            SizeWidth::Eight => out.extend_from_slice(&size.to_be_bytes()),
        }
    }

    /// `bytes` must be exactly `self.bytes()` long
    pub(crate) fn read(self, bytes: &[u8]) -> u64 {
        bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }
}

/// Schema of a tagged object: its id plus structural flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectSchema {
    pub id: u8,
    pub iterable: bool,
    pub typed: bool,
}

impl ObjectSchema {
    /// Plain value object
    pub const fn value(id: u8) -> Self {
        Self { id, iterable: false, typed: false }
    }

    /// Container whose items each carry their own header
    pub const fn untyped_iterable(id: u8) -> Self {
        Self { id, iterable: true, typed: false }
    }

    /// Container whose items share a single leading header
    pub const fn typed_iterable(id: u8) -> Self {
        Self { id, iterable: true, typed: true }
    }

    /// Catalogue byte for this schema with the given size width
    pub fn catalogue(self, width: SizeWidth) -> u8 {
        let mut catalogue = width.catalogue_bits();
        if self.iterable {
            catalogue |= ITERABLE_FLAG;
        }
        if self.typed {
            catalogue |= TYPED_FLAG;
        }
        catalogue
    }

    /// Decode the two header bytes
    pub fn from_header(catalogue: u8, id: u8) -> (Self, SizeWidth) {
        let schema = Self {
            id,
            iterable: catalogue & ITERABLE_FLAG != 0,
            typed: catalogue & TYPED_FLAG != 0,
        };
        (schema, SizeWidth::from_catalogue(catalogue))
    }
}

/// Schemas used by bound witness records and their providers
pub mod schemas {
    use super::ObjectSchema;

    pub const BOUND_WITNESS: ObjectSchema = ObjectSchema::untyped_iterable(0x01);
    pub const KEY_SET: ObjectSchema = ObjectSchema::untyped_iterable(0x02);
    pub const SIGNATURE_SET: ObjectSchema = ObjectSchema::untyped_iterable(0x03);
    pub const PAYLOAD: ObjectSchema = ObjectSchema::untyped_iterable(0x04);
    pub const SIGNED_PAYLOAD: ObjectSchema = ObjectSchema::untyped_iterable(0x05);
    pub const UNSIGNED_PAYLOAD: ObjectSchema = ObjectSchema::untyped_iterable(0x06);
    pub const PAYLOAD_SET: ObjectSchema = ObjectSchema::untyped_iterable(0x07);

    /// Records relayed together in one frame
    pub const BRIDGE_BATCH: ObjectSchema = ObjectSchema::untyped_iterable(0x08);
    /// Receiver's answer to a batch: accepted and rejected counts, u32 BE each
    pub const BRIDGE_ACK: ObjectSchema = ObjectSchema::value(0x09);

    pub const ED25519_PUBLIC_KEY: ObjectSchema = ObjectSchema::value(0x10);
    pub const ED25519_SIGNATURE: ObjectSchema = ObjectSchema::value(0x11);
    pub const SHA256_HASH: ObjectSchema = ObjectSchema::value(0x12);
    pub const BLAKE3_HASH: ObjectSchema = ObjectSchema::value(0x13);
}
