//! Bound witness records
//!
//! - `BoundWitness`: the record, its completion and consistency checks, and
//!   signing preimage derivation
//! - `Payload`: payload entry builder
//! - `Party` / `witness_locally`: contribution and signature folding

mod bound_witness;
mod party;
mod payload;

pub use bound_witness::BoundWitness;
pub use party::{witness_locally, Party};
pub use payload::Payload;
