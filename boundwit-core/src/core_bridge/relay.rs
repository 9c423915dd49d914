//! Relaying queued records to a bridge over a network pipe
//!
//! The sending side drains batches from a [`BridgeQueueHandle`] and sends
//! each as one `BRIDGE_BATCH` object. The receiving side validates every
//! record, queues the good ones locally and answers with a `BRIDGE_ACK`
//! carrying accepted and rejected counts. An acknowledged batch is removed
//! from the sender's queue; a batch that fails in transit stays queued with
//! its increased weight and goes out again on a later flush. Incomplete
//! records never go on the wire; the sender drops them from its queue.
//!
//! ```text
//!   sender                                   receiver
//!   blocks_to_bridge ─► BRIDGE_BATCH ──────► decode, verify, add_block
//!   remove_blocks    ◄─ BRIDGE_ACK(ok, bad) ◄┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::BridgeQueueHandle;
use crate::config::BridgeConfig;
use crate::core_codec::{encode, encode_untyped, schemas, CodecError, CodecResult, ObjectRef};
use crate::core_crypto::SignatureVerifier;
use crate::core_network::{NetworkPipe, TransportError};
use crate::core_witness::BoundWitness;
use crate::error::WitnessResult;
use crate::metrics::{
    Timer, RELAY_BATCHES_SENT, RELAY_EXCHANGE_MS, RELAY_RECORDS_DROPPED, RELAY_RECORDS_RECEIVED,
    RELAY_RECORDS_REJECTED,
};

/// Receiver's verdict on one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAck {
    pub accepted: u32,
    pub rejected: u32,
}

impl BatchAck {
    pub fn to_object(&self) -> Vec<u8> {
        let mut value = [0u8; 8];
        value[..4].copy_from_slice(&self.accepted.to_be_bytes());
        value[4..].copy_from_slice(&self.rejected.to_be_bytes());
        encode(schemas::BRIDGE_ACK, &value)
    }

    pub fn from_object(bytes: &[u8]) -> CodecResult<Self> {
        let value = ObjectRef::parse(bytes)?
            .expect_schema(schemas::BRIDGE_ACK)?
            .value();
        let value: [u8; 8] = value
            .try_into()
            .map_err(|_| CodecError::InvalidSize(value.len() as u64))?;

        let [a0, a1, a2, a3, r0, r1, r2, r3] = value;
        Ok(Self {
            accepted: u32::from_be_bytes([a0, a1, a2, a3]),
            rejected: u32::from_be_bytes([r0, r1, r2, r3]),
        })
    }
}

/// Encode records as one batch object
pub fn encode_batch(records: &[Arc<BoundWitness>]) -> Vec<u8> {
    encode_untyped(schemas::BRIDGE_BATCH, records.iter().map(|r| r.as_bytes()))
}

/// Decode a batch object into records
///
/// Only a malformed container fails the whole batch. A child that is not a
/// record comes back as its own error in place.
pub fn decode_batch(bytes: &[u8]) -> CodecResult<Vec<CodecResult<BoundWitness>>> {
    ObjectRef::parse(bytes)?
        .expect_schema(schemas::BRIDGE_BATCH)?
        .children()?
        .map(|child| child.map(|child| BoundWitness::from_bytes(child.as_bytes())))
        .collect()
}

/// Running totals for one relay session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Batches acknowledged
    pub batches: u64,
    pub accepted: u64,
    pub rejected: u64,
}

impl RelayStats {
    fn record(&mut self, ack: BatchAck) {
        self.batches += 1;
        self.accepted += u64::from(ack.accepted);
        self.rejected += u64::from(ack.rejected);
    }
}

/// Sends queued records to a bridge on a fixed interval
#[derive(Debug, Clone)]
pub struct BridgeRelay {
    queue: BridgeQueueHandle,
    flush_interval: Duration,
    purge_on_ack: Option<u32>,
}

impl BridgeRelay {
    pub fn new(queue: BridgeQueueHandle, config: &BridgeConfig) -> Self {
        Self {
            queue,
            flush_interval: config.flush_interval,
            purge_on_ack: config.purge_on_ack,
        }
    }

    /// Send one batch and wait for its acknowledgment
    ///
    /// Incomplete records in the batch are removed from the queue instead of
    /// sent. Returns `None` when the queue had nothing left to send.
    pub async fn relay_once(&self, pipe: &dyn NetworkPipe) -> WitnessResult<Option<BatchAck>> {
        let batch = loop {
            let batch = self.queue.blocks_to_bridge().await?;
            if batch.is_empty() {
                return Ok(None);
            }

            let (complete, incomplete): (Vec<_>, Vec<_>) =
                batch.into_iter().partition(|record| record.is_complete());
            if !incomplete.is_empty() {
                self.drop_incomplete(incomplete).await?;
            }
            if !complete.is_empty() {
                break complete;
            }
        };

        let timer = Timer::new(RELAY_EXCHANGE_MS);
        let reply = pipe.send(&encode_batch(&batch)).await?;
        let elapsed_ms = timer.stop();
        let ack = BatchAck::from_object(&reply)?;

        let removed = self.queue.remove_blocks(batch.clone()).await?;
        let purged = match self.purge_on_ack {
            Some(mask) => self.queue.purge_queue(mask).await?,
            None => 0,
        };

        counter!(RELAY_BATCHES_SENT).increment(1);
        debug!(
            peer = %pipe.peer(),
            sent = batch.len(),
            accepted = ack.accepted,
            rejected = ack.rejected,
            removed,
            purged,
            elapsed_ms,
            "Batch acknowledged"
        );
        if ack.rejected > 0 {
            warn!(peer = %pipe.peer(), rejected = ack.rejected, "Bridge rejected records");
        }
        Ok(Some(ack))
    }

    async fn drop_incomplete(&self, records: Vec<Arc<BoundWitness>>) -> WitnessResult<()> {
        let count = records.len();
        let removed = self.queue.remove_blocks(records).await?;
        counter!(RELAY_RECORDS_DROPPED).increment(removed as u64);
        warn!(count, removed, "Dropping incomplete records instead of relaying them");
        Ok(())
    }

    /// Relay until the queue is empty or `shutdown` fires, then close the pipe
    ///
    /// Transport failures end the session; the unacknowledged batch stays
    /// queued. The pipe is closed on every exit path.
    pub async fn run(
        &self,
        pipe: &dyn NetworkPipe,
        shutdown: CancellationToken,
    ) -> WitnessResult<RelayStats> {
        let outcome = self.relay_until_done(pipe, shutdown).await;
        let closed = pipe.close().await;
        let stats = outcome?;
        closed?;

        info!(
            batches = stats.batches,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "Relay session finished"
        );
        Ok(stats)
    }

    async fn relay_until_done(
        &self,
        pipe: &dyn NetworkPipe,
        shutdown: CancellationToken,
    ) -> WitnessResult<RelayStats> {
        let mut stats = RelayStats::default();
        let mut interval = tokio::time::interval(self.flush_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Relay cancelled");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.relay_once(pipe).await? {
                Some(ack) => stats.record(ack),
                None => break,
            }
        }
        Ok(stats)
    }
}

/// Validate a received batch and queue the complete, correctly signed records
///
/// A child that does not decode as a record is rejected on its own; the rest
/// of the batch is still processed.
pub async fn accept_batch<V>(
    queue: &BridgeQueueHandle,
    verifier: &V,
    frame: &[u8],
) -> WitnessResult<BatchAck>
where
    V: SignatureVerifier + ?Sized,
{
    let mut ack = BatchAck::default();
    for decoded in decode_batch(frame)? {
        let record = match decoded {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable relayed record");
                ack.rejected += 1;
                continue;
            }
        };

        match record.verify_signatures(verifier) {
            Ok(()) => {
                queue.add_block(record).await?;
                ack.accepted += 1;
            }
            Err(e) => {
                warn!(error = %e, "Rejecting relayed record");
                ack.rejected += 1;
            }
        }
    }

    counter!(RELAY_RECORDS_RECEIVED).increment(u64::from(ack.accepted));
    counter!(RELAY_RECORDS_REJECTED).increment(u64::from(ack.rejected));
    Ok(ack)
}

/// Answer batches from a relaying peer until it closes the pipe
pub async fn serve_relay<V>(
    queue: &BridgeQueueHandle,
    verifier: &V,
    pipe: &dyn NetworkPipe,
) -> WitnessResult<RelayStats>
where
    V: SignatureVerifier + ?Sized,
{
    let mut stats = RelayStats::default();
    let mut frame = pipe
        .initiation_data()
        .map(<[u8]>::to_vec)
        .ok_or(TransportError::Closed)?;

    loop {
        let ack = accept_batch(queue, verifier, &frame).await?;
        stats.record(ack);

        match pipe.send(&ack.to_object()).await {
            Ok(next) => frame = next,
            Err(TransportError::Closed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    info!(peer = %pipe.peer(), batches = stats.batches, accepted = stats.accepted, "Relay peer disconnected");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::Ed25519Verifier;
    use crate::core_network::MemoryPipe;
    use crate::error::WitnessError;
    use crate::test_utils::{assert_completes_within, numbered_record, recv_within, signed_record};
    use tokio::sync::mpsc;

    #[test]
    fn test_ack_object() {
        let ack = BatchAck {
            accepted: 7,
            rejected: 2,
        };
        assert_eq!(BatchAck::from_object(&ack.to_object()).unwrap(), ack);

        let wrong = encode(schemas::BRIDGE_ACK, &[1, 2, 3]);
        assert!(BatchAck::from_object(&wrong).is_err());
    }

    #[test]
    fn test_batch_object() {
        let records: Vec<_> = (0..3).map(|i| Arc::new(numbered_record(i))).collect();
        let decoded = decode_batch(&encode_batch(&records)).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].as_ref().unwrap(), &*records[2]);

        assert!(decode_batch(&encode_batch(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_batch_child_errors_stay_in_place() {
        let record = numbered_record(1);
        let stray = BatchAck::default().to_object();
        let frame = encode_untyped(schemas::BRIDGE_BATCH, [record.as_bytes(), stray.as_slice()]);

        let decoded = decode_batch(&frame).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().unwrap(), &record);
        assert!(matches!(decoded[1], Err(CodecError::UnexpectedSchema { .. })));

        assert!(decode_batch(&frame[..frame.len() - 1]).is_err());
    }

    #[tokio::test]
    async fn test_accept_batch_filters_invalid_records() {
        let (queue, _task) = BridgeQueueHandle::new();
        let good = Arc::new(signed_record(2, 1).await);
        let unsigned = Arc::new(numbered_record(5));

        let ack = accept_batch(&queue, &Ed25519Verifier, &encode_batch(&[good, unsigned]))
            .await
            .unwrap();
        assert_eq!(ack, BatchAck { accepted: 1, rejected: 1 });
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_accept_batch_rejects_undecodable_child() {
        let (queue, _task) = BridgeQueueHandle::new();
        let good = signed_record(2, 1).await;
        let stray = BatchAck::default().to_object();
        let frame = encode_untyped(schemas::BRIDGE_BATCH, [good.as_bytes(), stray.as_slice()]);

        let ack = accept_batch(&queue, &Ed25519Verifier, &frame).await.unwrap();
        assert_eq!(ack, BatchAck { accepted: 1, rejected: 1 });
        assert_eq!(queue.len().await.unwrap(), 1);

        let truncated = &frame[..frame.len() - 1];
        assert!(accept_batch(&queue, &Ed25519Verifier, truncated).await.is_err());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_session_survives_undecodable_record() {
        let (inbox, _task) = BridgeQueueHandle::new();
        let (initiator, pending) = MemoryPipe::pair();
        let receiver = {
            let inbox = inbox.clone();
            tokio::spawn(async move {
                let pipe = pending.accept().await.unwrap();
                serve_relay(&inbox, &Ed25519Verifier, &pipe).await.unwrap()
            })
        };

        let first = signed_record(2, 1).await;
        let stray = BatchAck::default().to_object();
        let mixed = encode_untyped(schemas::BRIDGE_BATCH, [first.as_bytes(), stray.as_slice()]);
        let reply = initiator.send(&mixed).await.unwrap();
        assert_eq!(BatchAck::from_object(&reply).unwrap(), BatchAck { accepted: 1, rejected: 1 });

        let second = Arc::new(signed_record(2, 2).await);
        let reply = initiator.send(&encode_batch(&[second])).await.unwrap();
        assert_eq!(BatchAck::from_object(&reply).unwrap(), BatchAck { accepted: 1, rejected: 0 });

        initiator.close().await.unwrap();
        let stats = receiver.await.unwrap();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(inbox.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_relay_session_over_memory_pipe() {
        let (outbox, _out_task) = BridgeQueueHandle::new();
        let (inbox, _in_task) = BridgeQueueHandle::new();
        for seed in 1..=12u8 {
            outbox.add_block(signed_record(2, seed).await).await.unwrap();
        }

        let (initiator, pending) = MemoryPipe::pair();
        let receiver = {
            let inbox = inbox.clone();
            tokio::spawn(async move {
                let pipe = pending.accept().await.unwrap();
                serve_relay(&inbox, &Ed25519Verifier, &pipe).await.unwrap()
            })
        };

        let config = BridgeConfig {
            flush_interval: Duration::from_millis(1),
            purge_on_ack: None,
        };
        let relay = BridgeRelay::new(outbox.clone(), &config);
        let sent = relay.run(&initiator, CancellationToken::new()).await.unwrap();
        let received = receiver.await.unwrap();

        assert_eq!(sent.batches, 2);
        assert_eq!(sent.accepted, 12);
        assert_eq!(received.accepted, 12);
        assert!(outbox.is_empty().await.unwrap());
        assert_eq!(inbox.len().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_batch_queued() {
        let (outbox, _task) = BridgeQueueHandle::new();
        outbox.add_block(signed_record(1, 1).await).await.unwrap();

        let (initiator, pending) = MemoryPipe::pair();
        drop(pending);

        let relay = BridgeRelay::new(outbox.clone(), &BridgeConfig::default());
        assert!(relay.relay_once(&initiator).await.is_err());
        assert_eq!(outbox.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_record_never_sent() {
        let (outbox, _task) = BridgeQueueHandle::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbox
            .add_listener("removed", move |record: &Arc<BoundWitness>| {
                let _ = tx.send(Arc::clone(record));
            })
            .await
            .unwrap();

        let signed = signed_record(2, 1).await;
        outbox.add_block(numbered_record(7)).await.unwrap();
        outbox.add_block(signed.clone()).await.unwrap();

        let (initiator, pending) = MemoryPipe::pair();
        let receiver = tokio::spawn(async move {
            let pipe = pending.accept().await.unwrap();
            let sent: Vec<_> = decode_batch(pipe.initiation_data().unwrap())
                .unwrap()
                .into_iter()
                .map(Result::unwrap)
                .collect();
            let ack = BatchAck {
                accepted: sent.len() as u32,
                rejected: 0,
            };
            let _ = pipe.send(&ack.to_object()).await;
            sent
        });

        let relay = BridgeRelay::new(outbox.clone(), &BridgeConfig::default());
        let ack = relay.relay_once(&initiator).await.unwrap();
        assert_eq!(ack, Some(BatchAck { accepted: 1, rejected: 0 }));
        initiator.close().await.unwrap();

        assert_eq!(receiver.await.unwrap(), vec![signed.clone()]);
        assert!(outbox.is_empty().await.unwrap());

        let dropped = recv_within(&mut rx, Duration::from_secs(1)).await.unwrap();
        assert_eq!(*dropped, numbered_record(7));
        let acked = recv_within(&mut rx, Duration::from_secs(1)).await.unwrap();
        assert_eq!(*acked, signed);
    }

    #[tokio::test]
    async fn test_only_incomplete_records_leave_pipe_silent() {
        let (outbox, _task) = BridgeQueueHandle::new();
        for n in 0..3 {
            outbox.add_block(numbered_record(n)).await.unwrap();
        }
        let (initiator, pending) = MemoryPipe::pair();

        let relay = BridgeRelay::new(outbox.clone(), &BridgeConfig::default());
        assert_eq!(relay.relay_once(&initiator).await.unwrap(), None);
        assert!(outbox.is_empty().await.unwrap());

        drop(initiator);
        assert!(matches!(pending.accept().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_bad_ack_still_closes_pipe() {
        let (outbox, _task) = BridgeQueueHandle::new();
        outbox.add_block(signed_record(1, 1).await).await.unwrap();

        let (initiator, pending) = MemoryPipe::pair();
        let responder = tokio::spawn(async move {
            let pipe = pending.accept().await.unwrap();
            pipe.send(b"not an ack").await
        });

        let config = BridgeConfig {
            flush_interval: Duration::from_millis(1),
            purge_on_ack: None,
        };
        let relay = BridgeRelay::new(outbox.clone(), &config);
        let result = relay.run(&initiator, CancellationToken::new()).await;
        assert!(matches!(result, Err(WitnessError::Codec(_))));

        let after = assert_completes_within(Duration::from_secs(1), responder)
            .await
            .unwrap();
        assert!(matches!(after, Err(TransportError::Closed)));
        assert_eq!(outbox.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_relay_sends_nothing() {
        let (outbox, _task) = BridgeQueueHandle::new();
        outbox.add_block(numbered_record(1)).await.unwrap();
        let (initiator, _pending) = MemoryPipe::pair();

        let token = CancellationToken::new();
        token.cancel();
        let relay = BridgeRelay::new(outbox.clone(), &BridgeConfig::default());
        let stats = relay.run(&initiator, token).await.unwrap();

        assert_eq!(stats, RelayStats::default());
        assert_eq!(outbox.len().await.unwrap(), 1);
    }
}
