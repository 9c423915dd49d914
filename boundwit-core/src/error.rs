//! Crate-level error type
//!
//! Each subsystem keeps its own error enum; `WitnessError` aggregates them for
//! operations that cross subsystem boundaries (signing a record, relaying it
//! over a pipe, awaiting a submitted task).

use thiserror::Error;

use crate::core_bridge::BridgeError;
use crate::core_codec::CodecError;
use crate::core_crypto::ProviderError;
use crate::core_network::TransportError;
use crate::executor::TaskError;

/// Result type for cross-subsystem operations
pub type WitnessResult<T> = Result<T, WitnessError>;

#[derive(Debug, Error)]
pub enum WitnessError {
    /// Encoded bytes violate the object layout
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Signing, hashing or verification failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Pipe send/close failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Bridge queue actor is gone
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Submitted task was cancelled or panicked
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Component sets disagree about the number of parties
    #[error("Inconsistent record: {keys} keys, {payloads} payloads, {signatures} signatures")]
    InconsistentRecord {
        keys: usize,
        payloads: usize,
        signatures: usize,
    },

    /// The signer's key is not the one at the slot awaiting a signature
    #[error("Signer does not own party slot {index}")]
    UnexpectedSigner { index: usize },

    /// A party's signature did not verify over the signing preimage
    #[error("Invalid signature for party {index}: {source}")]
    InvalidPartySignature {
        index: usize,
        #[source]
        source: ProviderError,
    },
}
