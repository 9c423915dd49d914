//! Bridge relay queue
//!
//! - `BridgeQueue`: weighted backlog of completed records awaiting relay
//! - `BridgeQueueHandle`: the same queue owned by an actor task
//! - `BridgeRelay` / `serve_relay`: both ends of a relay session over a pipe

mod handle;
mod listener;
mod queue;
mod relay;

pub use handle::{BridgeError, BridgeQueueHandle};
pub use listener::BridgeQueueListener;
pub use queue::{BridgeQueue, REMOVE_WEIGHT, SENT_LIMIT};
pub use relay::{
    accept_batch, decode_batch, encode_batch, serve_relay, BatchAck, BridgeRelay, RelayStats,
};
