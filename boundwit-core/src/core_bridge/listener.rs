//! Removal notifications

use std::sync::Arc;

use crate::core_witness::BoundWitness;

/// Notified each time a record leaves the bridge queue
///
/// Called synchronously on the task that removed the entry, once per record.
/// Implementations should hand slow work off to another task.
pub trait BridgeQueueListener: Send {
    fn on_removed(&mut self, record: &Arc<BoundWitness>);
}

impl<F> BridgeQueueListener for F
where
    F: FnMut(&Arc<BoundWitness>) + Send,
{
    fn on_removed(&mut self, record: &Arc<BoundWitness>) {
        self(record)
    }
}
