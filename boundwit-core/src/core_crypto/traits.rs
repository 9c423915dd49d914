//! Provider trait boundaries
//!
//! Concrete algorithms live behind these traits so a record can be signed or
//! hashed by whatever the node is configured with (software keys, hardware
//! keys, deterministic mocks in tests).

use async_trait::async_trait;

use super::errors::ProviderResult;
use super::types::{HashValue, PublicKey, Signature};

/// Produces signatures for the local party
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public key matching the signatures this signer produces
    fn public_key(&self) -> PublicKey;

    /// Sign raw bytes
    ///
    /// A failure must be reported as an error, never as an empty or
    /// placeholder signature.
    async fn sign_data(&self, data: &[u8]) -> ProviderResult<Signature>;
}

/// Produces digests
#[async_trait]
pub trait HashProvider: Send + Sync {
    async fn create_hash(&self, data: &[u8]) -> ProviderResult<HashValue>;
}

/// Checks a signature against a public key
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        public_key: &PublicKey,
        message: &[u8],
        signature: &Signature,
    ) -> ProviderResult<()>;
}
