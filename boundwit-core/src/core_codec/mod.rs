//! Object codec boundary
//!
//! Positional tagged objects: a two byte header, a size field and a value.
//! Containers hold ordered sub-objects that can be addressed by index and
//! sliced out of the original buffer without copying.

mod encoder;
mod error;
mod object;
mod schema;

pub use encoder::{encode, encode_typed, encode_untyped};
pub use error::{CodecError, CodecResult};
pub use object::{Children, Items, ObjectRef, TypedItems, HEADER_LEN};
pub use schema::{schemas, ObjectSchema, SizeWidth};
