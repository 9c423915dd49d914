//! Object encoding

use super::error::{CodecError, CodecResult};
use super::object::{ObjectRef, HEADER_LEN};
use super::schema::{ObjectSchema, SizeWidth};

/// Encode `value` under `schema`, using the narrowest size field that fits
pub fn encode(schema: ObjectSchema, value: &[u8]) -> Vec<u8> {
    let width = SizeWidth::for_value_len(value.len());
    let mut out = Vec::with_capacity(HEADER_LEN + width.bytes() + value.len());
    out.push(schema.catalogue(width));
    out.push(schema.id);
    width.write((value.len() + width.bytes()) as u64, &mut out);
    out.extend_from_slice(value);
    out
}

/// Encode an untyped container from already-encoded items
pub fn encode_untyped<I, T>(schema: ObjectSchema, items: I) -> Vec<u8>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    debug_assert!(schema.iterable && !schema.typed);

    let mut value = Vec::new();
    for item in items {
        value.extend_from_slice(item.as_ref());
    }
    encode(schema, &value)
}

/// Encode a typed container; every item must carry the same header
pub fn encode_typed<I, T>(schema: ObjectSchema, items: I) -> CodecResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    debug_assert!(schema.iterable && schema.typed);

    let mut value = Vec::new();
    let mut header: Option<[u8; HEADER_LEN]> = None;

    for item in items {
        let item = item.as_ref();
        ObjectRef::parse(item)?;

        let item_header = [item[0], item[1]];
        match header {
            None => {
                header = Some(item_header);
                value.extend_from_slice(&item_header);
            }
            Some(shared) if shared != item_header => return Err(CodecError::MixedItemHeaders),
            Some(_) => {}
        }
        value.extend_from_slice(&item[HEADER_LEN..]);
    }

    Ok(encode(schema, &value))
}
