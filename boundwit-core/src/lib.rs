//! Bound witness records and the bridge relay queue
//!
//! A bound witness is a multi-party attestation: every party contributes a
//! public key and a payload, then every party signs the same preimage. Once
//! complete, records wait in a weighted [`BridgeQueue`] until a relay hands
//! them to a bridge over a [`NetworkPipe`].

pub mod config;
pub mod core_bridge;
pub mod core_codec;
pub mod core_crypto;
pub mod core_network;
pub mod core_witness;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
pub use core_bridge::{BridgeQueue, BridgeQueueHandle, BridgeRelay};
pub use core_network::NetworkPipe;
pub use core_witness::{BoundWitness, Party, Payload};
pub use error::{WitnessError, WitnessResult};
pub use executor::TaskExecutor;
pub use logging::{init_logging, LogLevel};
