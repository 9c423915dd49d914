//! Tagged key, signature and hash values
//!
//! Each value remembers the object schema it is encoded under so it can be
//! folded into a record's key or signature set as a complete object.

use std::fmt;

use crate::core_codec::{encode, CodecResult, ObjectRef, ObjectSchema};

macro_rules! tagged_bytes {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            schema: ObjectSchema,
            bytes: Vec<u8>,
        }

        impl $name {
            pub fn new(schema: ObjectSchema, bytes: Vec<u8>) -> Self {
                Self { schema, bytes }
            }

            /// Decode from a complete encoded object
            pub fn from_object(object: &[u8]) -> CodecResult<Self> {
                let parsed = ObjectRef::parse(object)?;
                Ok(Self {
                    schema: parsed.schema(),
                    bytes: parsed.value().to_vec(),
                })
            }

            pub fn schema(&self) -> ObjectSchema {
                self.schema
            }

            /// Raw value bytes, without the object header
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            /// Complete encoded object
            pub fn to_object(&self) -> Vec<u8> {
                encode(self.schema, &self.bytes)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("schema", &format_args!("0x{:02x}", self.schema.id))
                    .field("bytes", &hex::encode(&self.bytes))
                    .finish()
            }
        }
    };
}

tagged_bytes!(
    /// A party's public key
    PublicKey
);

tagged_bytes!(
    /// A signature over a record's signing preimage
    Signature
);

tagged_bytes!(
    /// A digest of a record's signing preimage
    HashValue
);
