//! Task submission for signing and hashing work
//!
//! Callers submit a future and get back a [`TaskHandle`] they can await or
//! cancel independently. Every handle carries a child of the executor's root
//! cancellation token, so [`TaskExecutor::shutdown`] cancels everything still
//! in flight while cancelling one handle leaves the others alone.
//!
//! ```text
//!            root token
//!        ┌───────┼────────┐
//!     child    child    child
//!    (sign)   (hash)   (sign)
//! ```

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core_crypto::{HashProvider, HashValue, ProviderResult, Signature, Signer};
use crate::core_witness::BoundWitness;

/// Why a submitted task produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task was cancelled")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("No async runtime available")]
    NoRuntime,
}

/// Spawns work onto a runtime and tracks it with cancellation tokens
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    runtime: Handle,
    root: CancellationToken,
}

impl TaskExecutor {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            root: CancellationToken::new(),
        }
    }

    /// Executor bound to the runtime of the calling task
    pub fn try_current() -> Result<Self, TaskError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| TaskError::NoRuntime)
    }

    /// Spawn `future`; it stops at the next await point once cancelled
    pub fn submit<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.root.child_token();
        let task_token = token.clone();

        let join = self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => None,
                output = future => Some(output),
            }
        });

        TaskHandle { join, token }
    }

    /// Sign a record's preimage in the background
    pub fn sign_record(
        &self,
        record: BoundWitness,
        signer: Arc<dyn Signer>,
    ) -> TaskHandle<ProviderResult<Signature>> {
        self.submit(async move { record.sign(signer.as_ref()).await })
    }

    /// Hash a record's preimage in the background
    pub fn hash_record(
        &self,
        record: BoundWitness,
        hasher: Arc<dyn HashProvider>,
    ) -> TaskHandle<ProviderResult<HashValue>> {
        self.submit(async move { record.compute_hash(hasher.as_ref()).await })
    }

    /// Cancel every task submitted through this executor
    pub fn shutdown(&self) {
        debug!("Cancelling outstanding executor tasks");
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// Handle to one submitted task
#[derive(Debug)]
pub struct TaskHandle<T> {
    join: JoinHandle<Option<T>>,
    token: CancellationToken,
}

impl<T> TaskHandle<T> {
    /// Request cancellation; `join` then reports [`TaskError::Cancelled`]
    /// unless the task already finished
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Token that callers can hand to their own timeout logic
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the task's output
    pub async fn join(self) -> Result<T, TaskError> {
        match self.join.await {
            Ok(Some(output)) => Ok(output),
            Ok(None) => Err(TaskError::Cancelled),
            Err(e) if e.is_panic() => {
                warn!(error = %e, "Submitted task panicked");
                Err(TaskError::Panicked(e.to_string()))
            }
            Err(_) => Err(TaskError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::{Ed25519Signer, Sha256Hasher};
    use crate::test_utils::single_party_record;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_returns_output() {
        let executor = TaskExecutor::try_current().unwrap();
        let handle = executor.submit(async { 40 + 2 });
        assert_eq!(handle.join().await, Ok(42));
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let executor = TaskExecutor::try_current().unwrap();
        let handle = executor.submit(std::future::pending::<()>());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.join().await, Err(TaskError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_one_leaves_others() {
        let executor = TaskExecutor::try_current().unwrap();
        let cancelled = executor.submit(std::future::pending::<u8>());
        let running = executor.submit(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7u8
        });

        cancelled.cancel();
        assert_eq!(cancelled.join().await, Err(TaskError::Cancelled));
        assert_eq!(running.join().await, Ok(7));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything() {
        let executor = TaskExecutor::try_current().unwrap();
        let a = executor.submit(std::future::pending::<()>());
        let b = executor.submit(std::future::pending::<()>());

        executor.shutdown();
        assert!(executor.is_shutdown());
        assert_eq!(a.join().await, Err(TaskError::Cancelled));
        assert_eq!(b.join().await, Err(TaskError::Cancelled));
    }

    #[tokio::test]
    async fn test_panicking_task_reports_panic() {
        let executor = TaskExecutor::try_current().unwrap();
        let handle = executor.submit(async { panic!("boom") });
        assert!(matches!(handle.join().await, Err(TaskError::Panicked(_))));
    }

    #[test]
    fn test_no_runtime() {
        assert_eq!(TaskExecutor::try_current().unwrap_err(), TaskError::NoRuntime);
    }

    #[tokio::test]
    async fn test_sign_and_hash_record() {
        let executor = TaskExecutor::try_current().unwrap();
        let signer = Arc::new(Ed25519Signer::from_seed(&[8; 32]));
        let record = single_party_record(signer.as_ref()).await;

        let sig = executor.sign_record(record.clone(), signer.clone());
        let hash = executor.hash_record(record.clone(), Arc::new(Sha256Hasher));

        let sig = sig.join().await.unwrap().unwrap();
        let hash = hash.join().await.unwrap().unwrap();
        assert_eq!(sig, record.sign(signer.as_ref()).await.unwrap());
        assert_eq!(hash.as_bytes().len(), 32);
    }
}
