//! Async test helpers

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Wait for the next message, panicking after `duration`
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, duration: Duration) -> Option<T> {
    match timeout(duration, rx.recv()).await {
        Ok(message) => message,
        Err(_) => panic!("No message within {:?}", duration),
    }
}

/// Run `future`, panicking if it takes longer than `duration`
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}
