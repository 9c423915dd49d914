//! Error types for the object codec

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Structural violations found while decoding tagged objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes were available than the header or size field requires
    #[error("Truncated object: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Size field smaller than its own width or too large for this platform
    #[error("Invalid size field: {0}")]
    InvalidSize(u64),

    /// Bytes left over after a complete top-level object
    #[error("Trailing bytes after object: {0}")]
    TrailingBytes(usize),

    /// Sub-object access on a non-iterable object
    #[error("Object with schema 0x{0:02x} is not iterable")]
    NotIterable(u8),

    /// In-place slicing requested on a typed container
    #[error("Typed container 0x{0:02x} cannot be sliced in place")]
    TypedContainer(u8),

    /// Positional access past the end of a container
    #[error("Index {index} out of range for container of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    /// Object carries a different schema id than the caller required
    #[error("Unexpected schema: expected 0x{expected:02x}, got 0x{actual:02x}")]
    UnexpectedSchema { expected: u8, actual: u8 },

    /// Container holds a different number of sub-objects than its layout fixes
    #[error("Expected {expected} sub-objects, found {actual}")]
    UnexpectedItemCount { expected: usize, actual: usize },

    /// Items of a typed container must share a single header
    #[error("Typed container items do not share one header")]
    MixedItemHeaders,
}
