//! Error types for signing and hashing providers

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures reported by a signing, hashing or verification provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Underlying cryptographic fault
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Provider does not understand this public key schema
    #[error("Unsupported public key schema: 0x{0:02x}")]
    UnsupportedKey(u8),

    /// Provider does not understand this signature schema
    #[error("Unsupported signature schema: 0x{0:02x}")]
    UnsupportedSignature(u8),

    /// Signature did not verify
    #[error("Signature verification failed")]
    InvalidSignature,

    /// Provider could not service the request (e.g. hardware key missing)
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
