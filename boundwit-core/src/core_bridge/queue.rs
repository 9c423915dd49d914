//! Weighted backlog of records waiting to be relayed
//!
//! Entries are kept in a sorted index keyed by `(weight, insertion order)`,
//! so the lowest-weight records always come first and equal weights keep the
//! order they were added in. Every time an entry goes out in a batch its
//! weight grows by one; at [`REMOVE_WEIGHT`] it is dropped and the listeners
//! hear about it.
//!
//! ```text
//!   add_block ──► backlog (weight, seq) ──► blocks_to_bridge (≤ SENT_LIMIT)
//!                     │                          │ weight += 1
//!                     │◄─────────────────────────┘
//!                     │
//!                     ├─ weight ≥ REMOVE_WEIGHT ──► evicted ─┐
//!                     ├─ purge_queue(mask) ───────► purged  ─┼─► listeners
//!                     └─ remove_blocks(acked) ────► removed ─┘
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use metrics::{counter, gauge};
use tracing::{debug, trace};

use super::listener::BridgeQueueListener;
use crate::core_witness::BoundWitness;
use crate::metrics::{QUEUE_ADDED, QUEUE_BRIDGED, QUEUE_DEPTH, QUEUE_EVICTED, QUEUE_PURGED};

/// Most records handed out by one `blocks_to_bridge` call
pub const SENT_LIMIT: usize = 10;

/// Weight at which a record is dropped from the backlog
pub const REMOVE_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EntryKey {
    weight: u32,
    seq: u64,
}

/// Outgoing record backlog
///
/// Not synchronized: mutate through `&mut self`, or wrap it in a
/// [`BridgeQueueHandle`](super::BridgeQueueHandle) to share it between tasks.
#[derive(Default)]
pub struct BridgeQueue {
    backlog: BTreeMap<EntryKey, Arc<BoundWitness>>,
    next_seq: u64,
    listeners: BTreeMap<String, Box<dyn BridgeQueueListener>>,
}

impl BridgeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record with weight 0
    pub fn add_block(&mut self, record: impl Into<Arc<BoundWitness>>) {
        self.add_block_with_weight(record, 0);
    }

    /// Queue a record with a starting weight
    ///
    /// Weights at or above [`REMOVE_WEIGHT`] are accepted; such a record is
    /// evicted the first time it is selected.
    pub fn add_block_with_weight(&mut self, record: impl Into<Arc<BoundWitness>>, weight: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.backlog.insert(EntryKey { weight, seq }, record.into());

        counter!(QUEUE_ADDED).increment(1);
        self.report_depth();
        trace!(weight, seq, depth = self.backlog.len(), "Queued record for bridging");
    }

    /// Next batch to relay, lowest weight first
    ///
    /// Every selected record gains one unit of weight. Records that reach
    /// [`REMOVE_WEIGHT`] are still part of the returned batch, but they leave
    /// the backlog and the listeners are notified.
    pub fn blocks_to_bridge(&mut self) -> Vec<Arc<BoundWitness>> {
        let selected: Vec<EntryKey> = self.backlog.keys().take(SENT_LIMIT).copied().collect();
        let mut batch = Vec::with_capacity(selected.len());
        let mut evicted = Vec::new();

        for key in selected {
            let Some(record) = self.backlog.remove(&key) else {
                continue;
            };
            batch.push(Arc::clone(&record));

            let weight = key.weight.saturating_add(1);
            if weight >= REMOVE_WEIGHT {
                evicted.push(record);
            } else {
                self.backlog.insert(EntryKey { weight, ..key }, record);
            }
        }

        counter!(QUEUE_BRIDGED).increment(batch.len() as u64);
        if !evicted.is_empty() {
            counter!(QUEUE_EVICTED).increment(evicted.len() as u64);
            debug!(
                evicted = evicted.len(),
                depth = self.backlog.len(),
                "Evicted records that reached the removal weight"
            );
        }
        for record in &evicted {
            self.notify_removed(record);
        }
        self.report_depth();

        batch
    }

    /// Drop every record whose weight is at least `mask`
    ///
    /// `purge_queue(1)` removes everything that has been sent at least once.
    pub fn purge_queue(&mut self, mask: u32) -> usize {
        let purged = self.remove_where(|key, _| key.weight >= mask);
        if purged > 0 {
            counter!(QUEUE_PURGED).increment(purged as u64);
            debug!(mask, purged, depth = self.backlog.len(), "Purged bridge queue");
        }
        purged
    }

    /// Drop specific records, typically once the peer acknowledged them
    ///
    /// Entries match by identity: pass the `Arc`s handed out by
    /// [`blocks_to_bridge`](Self::blocks_to_bridge). A separately queued copy
    /// with the same bytes stays. Returns how many entries were removed.
    pub fn remove_blocks(&mut self, records: &[Arc<BoundWitness>]) -> usize {
        let removed = self.remove_where(|_, queued| {
            records.iter().any(|acked| Arc::ptr_eq(acked, queued))
        });
        if removed > 0 {
            counter!(QUEUE_PURGED).increment(removed as u64);
            debug!(removed, depth = self.backlog.len(), "Removed acknowledged records");
        }
        removed
    }

    /// Register a listener; a listener already under `key` is replaced
    pub fn add_listener(&mut self, key: impl Into<String>, listener: impl BridgeQueueListener + 'static) {
        self.insert_listener(key.into(), Box::new(listener));
    }

    pub(crate) fn insert_listener(&mut self, key: String, listener: Box<dyn BridgeQueueListener>) {
        self.listeners.insert(key, listener);
    }

    pub fn remove_listener(&mut self, key: &str) -> bool {
        self.listeners.remove(key).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Current weights in selection order
    pub fn weights(&self) -> Vec<u32> {
        self.backlog.keys().map(|key| key.weight).collect()
    }

    fn remove_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&EntryKey, &Arc<BoundWitness>) -> bool,
    {
        let doomed: Vec<EntryKey> = self
            .backlog
            .iter()
            .filter(|(key, record)| predicate(key, record))
            .map(|(key, _)| *key)
            .collect();

        for key in &doomed {
            if let Some(record) = self.backlog.remove(key) {
                self.notify_removed(&record);
            }
        }
        self.report_depth();
        doomed.len()
    }

    fn notify_removed(&mut self, record: &Arc<BoundWitness>) {
        for listener in self.listeners.values_mut() {
            listener.on_removed(record);
        }
    }

    fn report_depth(&self) {
        gauge!(QUEUE_DEPTH).set(self.backlog.len() as f64);
    }
}

impl fmt::Debug for BridgeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeQueue")
            .field("len", &self.backlog.len())
            .field("weights", &self.weights())
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
