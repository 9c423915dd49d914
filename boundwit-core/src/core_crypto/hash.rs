//! Hash providers

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::errors::ProviderResult;
use super::traits::HashProvider;
use super::types::HashValue;
use crate::core_codec::schemas;

/// SHA-256 digests
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

#[async_trait]
impl HashProvider for Sha256Hasher {
    async fn create_hash(&self, data: &[u8]) -> ProviderResult<HashValue> {
        Ok(HashValue::new(
            schemas::SHA256_HASH,
            Sha256::digest(data).to_vec(),
        ))
    }
}

/// BLAKE3 digests
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Hasher;

#[async_trait]
impl HashProvider for Blake3Hasher {
    async fn create_hash(&self, data: &[u8]) -> ProviderResult<HashValue> {
        Ok(HashValue::new(
            schemas::BLAKE3_HASH,
            blake3::hash(data).as_bytes().to_vec(),
        ))
    }
}
