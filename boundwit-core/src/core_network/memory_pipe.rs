//! In-process pipe pair
//!
//! Behaves like a TCP pipe without sockets: the initiator's first message is
//! picked up by [`PendingMemoryPipe::accept`] and becomes the responder's
//! initiation data.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::error::{TransportError, TransportResult};
use super::pipe::{NetworkPeer, NetworkPipe, PipeRole};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct MemoryPipe {
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    peer: NetworkPeer,
    initiation: Option<Vec<u8>>,
}

/// Responder side of a pair, waiting for the initiator's first message
#[derive(Debug)]
pub struct PendingMemoryPipe {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl MemoryPipe {
    /// Connected pair: the initiator pipe and the not-yet-accepted responder
    pub fn pair() -> (MemoryPipe, PendingMemoryPipe) {
        let (to_responder, from_initiator) = mpsc::channel(CHANNEL_CAPACITY);
        let (to_initiator, from_responder) = mpsc::channel(CHANNEL_CAPACITY);

        let initiator = MemoryPipe {
            tx: Mutex::new(Some(to_responder)),
            rx: Mutex::new(from_responder),
            peer: NetworkPeer::new("memory", PipeRole::Responder),
            initiation: None,
        };
        let pending = PendingMemoryPipe {
            tx: to_initiator,
            rx: from_initiator,
        };
        (initiator, pending)
    }
}

impl PendingMemoryPipe {
    pub async fn accept(mut self) -> TransportResult<MemoryPipe> {
        let initiation = self.rx.recv().await.ok_or(TransportError::Closed)?;
        Ok(MemoryPipe {
            tx: Mutex::new(Some(self.tx)),
            rx: Mutex::new(self.rx),
            peer: NetworkPeer::new("memory", PipeRole::Initiator),
            initiation: Some(initiation),
        })
    }
}

#[async_trait]
impl NetworkPipe for MemoryPipe {
    fn peer(&self) -> &NetworkPeer {
        &self.peer
    }

    fn initiation_data(&self) -> Option<&[u8]> {
        self.initiation.as_deref()
    }

    async fn send(&self, data: &[u8]) -> TransportResult<Vec<u8>> {
        let tx = self.tx.lock().await.clone().ok_or(TransportError::Closed)?;
        tx.send(data.to_vec())
            .await
            .map_err(|_| TransportError::Closed)?;
        drop(tx);

        let reply = self.rx.lock().await.recv().await.ok_or(TransportError::Closed)?;
        trace!(sent = data.len(), received = reply.len(), "Memory pipe exchange");
        Ok(reply)
    }

    async fn close(&self) -> TransportResult<()> {
        self.tx.lock().await.take();
        Ok(())
    }
}
