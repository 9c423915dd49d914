//! Duplex byte exchange with one peer

use std::fmt;

use async_trait::async_trait;

use super::error::TransportResult;

/// Which side opened the pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeRole {
    Initiator,
    Responder,
}

/// The remote end of a pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPeer {
    pub address: String,
    /// Role of the remote side
    pub role: PipeRole,
}

impl NetworkPeer {
    pub fn new(address: impl Into<String>, role: PipeRole) -> Self {
        Self {
            address: address.into(),
            role,
        }
    }
}

impl fmt::Display for NetworkPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.address, self.role)
    }
}

/// Request/response pipe to a single peer
///
/// `send` writes one message and waits for the peer's next message. A
/// responder finds the initiator's first message in `initiation_data` and
/// answers it with `send`.
#[async_trait]
pub trait NetworkPipe: Send + Sync {
    fn peer(&self) -> &NetworkPeer;

    /// First message from the initiator, present on the responding side only
    fn initiation_data(&self) -> Option<&[u8]>;

    async fn send(&self, data: &[u8]) -> TransportResult<Vec<u8>>;

    async fn close(&self) -> TransportResult<()>;
}
