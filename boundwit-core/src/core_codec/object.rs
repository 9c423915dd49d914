//! Zero-copy views over encoded objects
//!
//! An [`ObjectRef`] borrows the buffer it was parsed from and remembers its
//! absolute byte range in that buffer, so sub-objects located through
//! [`ObjectRef::children`] can be turned back into ranges of the root buffer.

use std::borrow::Cow;
use std::ops::Range;

use super::error::{CodecError, CodecResult};
use super::schema::{ObjectSchema, SizeWidth};

/// Catalogue byte plus schema id
pub const HEADER_LEN: usize = 2;

/// Borrowed view of one encoded object
#[derive(Debug, Clone, Copy)]
pub struct ObjectRef<'a> {
    buf: &'a [u8],
    start: usize,
    value_start: usize,
    end: usize,
    schema: ObjectSchema,
}

impl<'a> ObjectRef<'a> {
    /// Parse `bytes` as exactly one object
    pub fn parse(bytes: &'a [u8]) -> CodecResult<Self> {
        let object = Self::parse_at(bytes, 0)?;
        if object.end != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - object.end));
        }
        Ok(object)
    }

    /// Parse the object starting at `start`; `buf` bounds how far it may extend
    pub(crate) fn parse_at(buf: &'a [u8], start: usize) -> CodecResult<Self> {
        let available = buf.len().saturating_sub(start);
        if available < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available,
            });
        }

        let (schema, width) = ObjectSchema::from_header(buf[start], buf[start + 1]);
        let (value_start, end) = read_sized(buf, start + HEADER_LEN, width)?;

        Ok(Self {
            buf,
            start,
            value_start,
            end,
            schema,
        })
    }

    pub fn schema(&self) -> ObjectSchema {
        self.schema
    }

    /// Full encoding, header included
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.buf[self.start..self.end]
    }

    /// Value bytes after the header and size field
    pub fn value(&self) -> &'a [u8] {
        &self.buf[self.value_start..self.end]
    }

    /// Absolute byte range inside the root buffer
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Require a particular schema id
    pub fn expect_schema(self, expected: ObjectSchema) -> CodecResult<Self> {
        if self.schema.id != expected.id {
            return Err(CodecError::UnexpectedSchema {
                expected: expected.id,
                actual: self.schema.id,
            });
        }
        Ok(self)
    }

    /// Sub-objects of an untyped container, borrowed in place
    pub fn children(&self) -> CodecResult<Children<'a>> {
        if !self.schema.iterable {
            return Err(CodecError::NotIterable(self.schema.id));
        }
        if self.schema.typed {
            return Err(CodecError::TypedContainer(self.schema.id));
        }
        Ok(Children {
            buf: &self.buf[..self.end],
            cursor: self.value_start,
            failed: false,
        })
    }

    /// Sub-objects of any container; typed items are rebuilt with their header
    pub fn items(&self) -> CodecResult<Items<'a>> {
        if !self.schema.iterable {
            return Err(CodecError::NotIterable(self.schema.id));
        }
        if !self.schema.typed {
            return Ok(Items::Untyped(self.children()?));
        }

        let value = self.value();
        if value.is_empty() {
            return Ok(Items::Typed(TypedItems::empty()));
        }
        if value.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: value.len(),
            });
        }

        let header = [value[0], value[1]];
        let (_, width) = ObjectSchema::from_header(header[0], header[1]);
        Ok(Items::Typed(TypedItems {
            buf: &self.buf[..self.end],
            header,
            width,
            cursor: self.value_start + HEADER_LEN,
            failed: false,
        }))
    }

    /// Number of sub-objects in a container
    pub fn count(&self) -> CodecResult<usize> {
        let mut count = 0;
        for item in self.items()? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Positional access into an untyped container
    pub fn child(&self, index: usize) -> CodecResult<ObjectRef<'a>> {
        let mut len = 0;
        for child in self.children()? {
            let child = child?;
            if len == index {
                return Ok(child);
            }
            len += 1;
        }
        Err(CodecError::IndexOutOfRange { index, len })
    }

    /// Positional access into any container
    pub fn item(&self, index: usize) -> CodecResult<Cow<'a, [u8]>> {
        let mut len = 0;
        for item in self.items()? {
            let item = item?;
            if len == index {
                return Ok(item);
            }
            len += 1;
        }
        Err(CodecError::IndexOutOfRange { index, len })
    }
}

/// Read a size field at `offset` and return the value start and object end
fn read_sized(buf: &[u8], offset: usize, width: SizeWidth) -> CodecResult<(usize, usize)> {
    let available = buf.len().saturating_sub(offset);
    let w = width.bytes();
    if available < w {
        return Err(CodecError::Truncated { needed: w, available });
    }

    let size = width.read(&buf[offset..offset + w]);
    if size < w as u64 {
        return Err(CodecError::InvalidSize(size));
    }
    let size = usize::try_from(size).map_err(|_| CodecError::InvalidSize(size))?;
    if size > available {
        return Err(CodecError::Truncated {
            needed: size,
            available,
        });
    }

    Ok((offset + w, offset + size))
}

/// Iterator over the sub-objects of an untyped container
#[derive(Debug, Clone)]
pub struct Children<'a> {
    buf: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> Iterator for Children<'a> {
    type Item = CodecResult<ObjectRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.buf.len() {
            return None;
        }
        match ObjectRef::parse_at(self.buf, self.cursor) {
            Ok(child) => {
                self.cursor = child.end;
                Some(Ok(child))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Items of a typed container: `[shared header]([size][value])*`
#[derive(Debug, Clone)]
pub struct TypedItems<'a> {
    buf: &'a [u8],
    header: [u8; HEADER_LEN],
    width: SizeWidth,
    cursor: usize,
    failed: bool,
}

impl<'a> TypedItems<'a> {
    fn empty() -> Self {
        Self {
            buf: &[],
            header: [0; HEADER_LEN],
            width: SizeWidth::One,
            cursor: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for TypedItems<'a> {
    type Item = CodecResult<Cow<'a, [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.buf.len() {
            return None;
        }
        match read_sized(self.buf, self.cursor, self.width) {
            Ok((_, end)) => {
                let mut item = Vec::with_capacity(HEADER_LEN + end - self.cursor);
                item.extend_from_slice(&self.header);
                item.extend_from_slice(&self.buf[self.cursor..end]);
                self.cursor = end;
                Some(Ok(Cow::Owned(item)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Items of either container kind
#[derive(Debug, Clone)]
pub enum Items<'a> {
    Untyped(Children<'a>),
    Typed(TypedItems<'a>),
}

impl<'a> Iterator for Items<'a> {
    type Item = CodecResult<Cow<'a, [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Items::Untyped(children) => children
                .next()
                .map(|child| child.map(|c| Cow::Borrowed(c.as_bytes()))),
            Items::Typed(items) => items.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_codec::{encode, encode_typed, encode_untyped};

    const LEAF: ObjectSchema = ObjectSchema::value(0x20);
    const LIST: ObjectSchema = ObjectSchema::untyped_iterable(0x21);
    const TYPED: ObjectSchema = ObjectSchema::typed_iterable(0x22);

    #[test]
    fn test_parse_leaf() {
        let bytes = encode(LEAF, &[0xAA, 0xBB]);
        assert_eq!(bytes, vec![0x00, 0x20, 0x03, 0xAA, 0xBB]);

        let object = ObjectRef::parse(&bytes).unwrap();
        assert_eq!(object.schema(), LEAF);
        assert_eq!(object.value(), &[0xAA, 0xBB]);
        assert_eq!(object.range(), 0..5);
    }

    #[test]
    fn test_children_ranges_are_absolute() {
        let a = encode(LEAF, &[1]);
        let b = encode(LEAF, &[2, 3]);
        let list = encode_untyped(LIST, [&a, &b]);

        let object = ObjectRef::parse(&list).unwrap();
        let children: Vec<_> = object.children().unwrap().map(|c| c.unwrap()).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(&list[children[0].range()], a.as_slice());
        assert_eq!(&list[children[1].range()], b.as_slice());
    }

    #[test]
    fn test_typed_items_rebuild_headers() {
        let a = encode(LEAF, &[1]);
        let b = encode(LEAF, &[2]);
        let typed = encode_typed(TYPED, [&a, &b]).unwrap();

        let object = ObjectRef::parse(&typed).unwrap();
        assert_eq!(object.count().unwrap(), 2);
        assert_eq!(object.item(1).unwrap().as_ref(), b.as_slice());
        assert!(matches!(
            object.children(),
            Err(CodecError::TypedContainer(0x22))
        ));
    }

    #[test]
    fn test_empty_typed_container() {
        let typed = encode_typed(TYPED, Vec::<Vec<u8>>::new()).unwrap();
        let object = ObjectRef::parse(&typed).unwrap();
        assert_eq!(object.count().unwrap(), 0);
    }

    #[test]
    fn test_truncated_size() {
        let bytes = vec![0x00, 0x20, 0x09, 0xAA];
        assert_eq!(
            ObjectRef::parse(&bytes).unwrap_err(),
            CodecError::Truncated {
                needed: 9,
                available: 2
            }
        );
    }

    #[test]
    fn test_size_smaller_than_width() {
        let bytes = vec![0x40, 0x20, 0x00, 0x01];
        assert_eq!(
            ObjectRef::parse(&bytes).unwrap_err(),
            CodecError::InvalidSize(1)
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = encode(LEAF, &[1]);
        bytes.push(0xFF);
        assert_eq!(
            ObjectRef::parse(&bytes).unwrap_err(),
            CodecError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_child_out_of_range() {
        let list = encode_untyped(LIST, [encode(LEAF, &[1])]);
        let object = ObjectRef::parse(&list).unwrap();
        assert_eq!(
            object.child(3).unwrap_err(),
            CodecError::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn test_leaf_is_not_iterable() {
        let bytes = encode(LEAF, &[1]);
        let object = ObjectRef::parse(&bytes).unwrap();
        assert!(matches!(object.count(), Err(CodecError::NotIterable(0x20))));
    }

    #[test]
    fn test_child_overrunning_container_fails() {
        // container claims 4 bytes total, child claims 5 bytes of value
        let bytes = vec![0x20, 0x21, 0x04, 0x00, 0x20, 0x06];
        let object = ObjectRef::parse_at(&bytes, 0).unwrap();
        let result: Result<Vec<_>, _> = object.children().unwrap().collect();
        assert!(result.is_err());
    }
}
