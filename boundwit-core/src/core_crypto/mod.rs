//! Signing and hashing providers
//!
//! Trait boundaries plus reference implementations:
//! - `Ed25519Signer` / `Ed25519Verifier` (ed25519-dalek)
//! - `Sha256Hasher` (sha2), `Blake3Hasher` (blake3)

mod ed25519;
mod errors;
mod hash;
mod traits;
mod types;

pub use ed25519::{Ed25519Signer, Ed25519Verifier};
pub use errors::{ProviderError, ProviderResult};
pub use hash::{Blake3Hasher, Sha256Hasher};
pub use traits::{HashProvider, SignatureVerifier, Signer};
pub use types::{HashValue, PublicKey, Signature};
