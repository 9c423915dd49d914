//! Metric names and helpers
//!
//! Library code records through the `metrics` facade; nothing is collected
//! until a binary installs a recorder. [`init_metrics`] registers the
//! descriptions so exporters can show help text.

use metrics::{describe_counter, describe_gauge, describe_histogram, histogram, Unit};
use std::time::Instant;

pub const QUEUE_ADDED: &str = "bridge.queue.added";
pub const QUEUE_BRIDGED: &str = "bridge.queue.bridged";
pub const QUEUE_EVICTED: &str = "bridge.queue.evicted";
pub const QUEUE_PURGED: &str = "bridge.queue.purged";
pub const QUEUE_DEPTH: &str = "bridge.queue.depth";

pub const RELAY_BATCHES_SENT: &str = "bridge.relay.batches_sent";
pub const RELAY_RECORDS_RECEIVED: &str = "bridge.relay.records_received";
pub const RELAY_RECORDS_REJECTED: &str = "bridge.relay.records_rejected";
pub const RELAY_RECORDS_DROPPED: &str = "bridge.relay.records_dropped";
pub const RELAY_EXCHANGE_MS: &str = "bridge.relay.exchange_ms";

pub const WITNESS_SIGNATURES_FOLDED: &str = "witness.signatures.folded";
pub const WITNESS_SIGNING_MS: &str = "witness.signing_ms";

/// Register descriptions for every metric this crate emits
pub fn init_metrics() {
    describe_counter!(QUEUE_ADDED, Unit::Count, "Records admitted to the bridge queue");
    describe_counter!(QUEUE_BRIDGED, Unit::Count, "Records handed out in relay batches");
    describe_counter!(QUEUE_EVICTED, Unit::Count, "Records dropped after reaching the removal weight");
    describe_counter!(QUEUE_PURGED, Unit::Count, "Records removed by purge or acknowledgment");
    describe_gauge!(QUEUE_DEPTH, Unit::Count, "Records currently waiting in the bridge queue");

    describe_counter!(RELAY_BATCHES_SENT, Unit::Count, "Batches acknowledged by the remote bridge");
    describe_counter!(RELAY_RECORDS_RECEIVED, Unit::Count, "Records accepted from a relaying peer");
    describe_counter!(RELAY_RECORDS_REJECTED, Unit::Count, "Incoming records that failed validation");
    describe_counter!(RELAY_RECORDS_DROPPED, Unit::Count, "Incomplete records dropped instead of relayed");
    describe_histogram!(RELAY_EXCHANGE_MS, Unit::Milliseconds, "Batch send to acknowledgment latency");

    describe_counter!(WITNESS_SIGNATURES_FOLDED, Unit::Count, "Signatures folded into bound witnesses");
    describe_histogram!(WITNESS_SIGNING_MS, Unit::Milliseconds, "Signing provider latency");
}

/// Records elapsed milliseconds into a histogram when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time and return it in milliseconds
    pub fn stop(self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.name).record(elapsed);
        elapsed
    }
}
