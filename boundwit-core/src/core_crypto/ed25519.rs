//! Ed25519 signing provider
//!
//! Software keys via ed25519-dalek. The signing key zeroizes itself on drop.

use std::fmt;

use async_trait::async_trait;
use ed25519_dalek::{Signature as DalekSignature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

use super::errors::{ProviderError, ProviderResult};
use super::traits::{SignatureVerifier, Signer};
use super::types::{PublicKey, Signature};
use crate::core_codec::schemas;

/// Signs with an in-memory Ed25519 key
#[derive(Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::random();
        Self::from_seed(&seed)
    }

    /// Deterministic key from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public", &hex::encode(self.signing_key.verifying_key().as_bytes()))
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        PublicKey::new(
            schemas::ED25519_PUBLIC_KEY,
            self.signing_key.verifying_key().to_bytes().to_vec(),
        )
    }

    async fn sign_data(&self, data: &[u8]) -> ProviderResult<Signature> {
        let signature: DalekSignature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| ProviderError::Crypto(e.to_string()))?;
        Ok(Signature::new(
            schemas::ED25519_SIGNATURE,
            signature.to_bytes().to_vec(),
        ))
    }
}

/// Verifies Ed25519 signatures
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        public_key: &PublicKey,
        message: &[u8],
        signature: &Signature,
    ) -> ProviderResult<()> {
        if public_key.schema().id != schemas::ED25519_PUBLIC_KEY.id {
            return Err(ProviderError::UnsupportedKey(public_key.schema().id));
        }
        if signature.schema().id != schemas::ED25519_SIGNATURE.id {
            return Err(ProviderError::UnsupportedSignature(signature.schema().id));
        }

        let key_bytes: [u8; 32] = public_key.as_bytes().try_into().map_err(|_| {
            ProviderError::Crypto(format!(
                "Ed25519 public key must be 32 bytes, got {}",
                public_key.as_bytes().len()
            ))
        })?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| ProviderError::Crypto(e.to_string()))?;
        let signature = DalekSignature::from_slice(signature.as_bytes())
            .map_err(|e| ProviderError::Crypto(e.to_string()))?;

        verifying_key
            .verify(message, &signature)
            .map_err(|_| ProviderError::InvalidSignature)
    }
}
