//! Shared fixtures for unit and integration tests
//!
//! Compiled for unit tests and behind the `test-utils` feature, which the
//! crate's dev-dependency on itself turns on for `tests/` and `benches/`.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
