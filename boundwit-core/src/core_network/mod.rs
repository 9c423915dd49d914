//! Network pipes
//!
//! - `NetworkPipe`: request/response byte exchange with one peer
//! - `TcpPipe` / `TcpPipeListener` / `PendingTcpPipe`: length framed TCP transport
//! - `MemoryPipe`: in-process pair for tests and local wiring

mod error;
mod memory_pipe;
mod pipe;
mod tcp_pipe;

pub use error::{TransportError, TransportResult};
pub use memory_pipe::{MemoryPipe, PendingMemoryPipe};
pub use pipe::{NetworkPeer, NetworkPipe, PipeRole};
pub use tcp_pipe::{
    read_frame, write_frame, PendingTcpPipe, PipeOptions, TcpPipe, TcpPipeListener,
};
