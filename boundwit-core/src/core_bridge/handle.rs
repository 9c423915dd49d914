/*
   BridgeQueueHandle

   Shares one BridgeQueue between tasks. The queue itself lives on a
   dedicated actor task; handles are cheap clones of a command sender, and
   every queue operation becomes a BridgeCommand. Replies come back over
   oneshot channels, so callers see the same results as they would calling the
   queue directly.

       ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
       │ witness task │   │ relay task   │   │ ack handler  │
       │ add_block    │   │ blocks_to_   │   │ remove_blocks│
       └──────┬───────┘   │   bridge     │   └──────┬───────┘
              │           └──────┬───────┘          │
              └──────────────────┼──────────────────┘
                                 │ mpsc<BridgeCommand>
                        ┌────────▼────────┐
                        │  queue actor    │
                        │  (owns queue)   │
                        └─────────────────┘

   Listener callbacks run on the actor task.
*/

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::listener::BridgeQueueListener;
use super::queue::BridgeQueue;
use crate::core_witness::BoundWitness;

const COMMAND_BUFFER: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Bridge queue actor has stopped")]
    Stopped,
}

/// Commands handled by the queue actor
enum BridgeCommand {
    AddBlock {
        record: Arc<BoundWitness>,
        weight: u32,
    },
    BlocksToBridge {
        response_tx: oneshot::Sender<Vec<Arc<BoundWitness>>>,
    },
    PurgeQueue {
        mask: u32,
        response_tx: oneshot::Sender<usize>,
    },
    RemoveBlocks {
        records: Vec<Arc<BoundWitness>>,
        response_tx: oneshot::Sender<usize>,
    },
    AddListener {
        key: String,
        listener: Box<dyn BridgeQueueListener>,
    },
    RemoveListener {
        key: String,
        response_tx: oneshot::Sender<bool>,
    },
    Len {
        response_tx: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Cloneable handle to a queue running on its own task
#[derive(Clone, Debug)]
pub struct BridgeQueueHandle {
    command_tx: mpsc::Sender<BridgeCommand>,
}

impl BridgeQueueHandle {
    /// Spawn an actor around an empty queue
    pub fn new() -> (Self, JoinHandle<BridgeQueue>) {
        Self::spawn(BridgeQueue::new())
    }

    /// Spawn an actor that takes ownership of `queue`
    ///
    /// The join handle yields the queue back once the actor stops.
    pub fn spawn(queue: BridgeQueue) -> (Self, JoinHandle<BridgeQueue>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = tokio::spawn(run_actor(queue, command_rx));
        (Self { command_tx }, handle)
    }

    pub async fn add_block(&self, record: impl Into<Arc<BoundWitness>>) -> Result<(), BridgeError> {
        self.add_block_with_weight(record, 0).await
    }

    pub async fn add_block_with_weight(
        &self,
        record: impl Into<Arc<BoundWitness>>,
        weight: u32,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::AddBlock {
            record: record.into(),
            weight,
        })
        .await
    }

    pub async fn blocks_to_bridge(&self) -> Result<Vec<Arc<BoundWitness>>, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BridgeCommand::BlocksToBridge { response_tx }).await?;
        response_rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn purge_queue(&self, mask: u32) -> Result<usize, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BridgeCommand::PurgeQueue { mask, response_tx }).await?;
        response_rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn remove_blocks(&self, records: Vec<Arc<BoundWitness>>) -> Result<usize, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BridgeCommand::RemoveBlocks {
            records,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn add_listener(
        &self,
        key: impl Into<String>,
        listener: impl BridgeQueueListener + 'static,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::AddListener {
            key: key.into(),
            listener: Box::new(listener),
        })
        .await
    }

    pub async fn remove_listener(&self, key: impl Into<String>) -> Result<bool, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BridgeCommand::RemoveListener {
            key: key.into(),
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn len(&self) -> Result<usize, BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(BridgeCommand::Len { response_tx }).await?;
        response_rx.await.map_err(|_| BridgeError::Stopped)
    }

    pub async fn is_empty(&self) -> Result<bool, BridgeError> {
        Ok(self.len().await? == 0)
    }

    /// Stop the actor after it drains already-queued commands
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.send(BridgeCommand::Shutdown).await
    }

    async fn send(&self, command: BridgeCommand) -> Result<(), BridgeError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| BridgeError::Stopped)
    }
}

async fn run_actor(
    mut queue: BridgeQueue,
    mut command_rx: mpsc::Receiver<BridgeCommand>,
) -> BridgeQueue {
    debug!("Bridge queue actor started");

    while let Some(command) = command_rx.recv().await {
        match command {
            BridgeCommand::AddBlock { record, weight } => {
                queue.add_block_with_weight(record, weight);
            }
            BridgeCommand::BlocksToBridge { response_tx } => {
                let _ = response_tx.send(queue.blocks_to_bridge());
            }
            BridgeCommand::PurgeQueue { mask, response_tx } => {
                let _ = response_tx.send(queue.purge_queue(mask));
            }
            BridgeCommand::RemoveBlocks {
                records,
                response_tx,
            } => {
                let _ = response_tx.send(queue.remove_blocks(&records));
            }
            BridgeCommand::AddListener { key, listener } => {
                trace!(%key, "Registering bridge queue listener");
                queue.insert_listener(key, listener);
            }
            BridgeCommand::RemoveListener { key, response_tx } => {
                let _ = response_tx.send(queue.remove_listener(&key));
            }
            BridgeCommand::Len { response_tx } => {
                let _ = response_tx.send(queue.len());
            }
            BridgeCommand::Shutdown => break,
        }
    }

    debug!(depth = queue.len(), "Bridge queue actor stopped");
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_bridge::{REMOVE_WEIGHT, SENT_LIMIT};
    use crate::test_utils::numbered_record;

    #[tokio::test]
    async fn test_handle_batches_like_queue() {
        let (queue, _task) = BridgeQueueHandle::new();
        for i in 0..12 {
            queue.add_block(numbered_record(i)).await.unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 12);
        assert_eq!(queue.blocks_to_bridge().await.unwrap().len(), SENT_LIMIT);

        let second = queue.blocks_to_bridge().await.unwrap();
        assert_eq!(*second[0], numbered_record(10));
        assert_eq!(*second[1], numbered_record(11));
    }

    #[tokio::test]
    async fn test_listener_runs_on_actor() {
        let (queue, _task) = BridgeQueueHandle::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        queue
            .add_listener("relay", move |record: &Arc<BoundWitness>| {
                let _ = tx.send(Arc::clone(record));
            })
            .await
            .unwrap();

        queue
            .add_block_with_weight(numbered_record(1), REMOVE_WEIGHT - 1)
            .await
            .unwrap();
        assert_eq!(queue.blocks_to_bridge().await.unwrap().len(), 1);

        let removed = rx.recv().await.unwrap();
        assert_eq!(*removed, numbered_record(1));
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_and_remove_through_handle() {
        let (queue, _task) = BridgeQueueHandle::new();
        let acked = Arc::new(numbered_record(0));
        queue.add_block(Arc::clone(&acked)).await.unwrap();
        queue.add_block_with_weight(numbered_record(1), 60).await.unwrap();
        queue.add_block(numbered_record(2)).await.unwrap();

        assert_eq!(queue.purge_queue(50).await.unwrap(), 1);
        assert_eq!(queue.remove_blocks(vec![acked]).await.unwrap(), 1);
        assert_eq!(queue.len().await.unwrap(), 1);
        assert!(!queue.remove_listener("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_returns_queue() {
        let (queue, task) = BridgeQueueHandle::new();
        queue.add_block(numbered_record(7)).await.unwrap();
        queue.shutdown().await.unwrap();

        let inner = task.await.unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(queue.len().await, Err(BridgeError::Stopped));
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let (queue, _task) = BridgeQueueHandle::new();
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        queue.add_block(numbered_record(p * 100 + i)).await.unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 100);
        assert!(queue.blocks_to_bridge().await.unwrap().len() <= SENT_LIMIT);
    }
}
