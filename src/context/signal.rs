//! Completion signal between an in-process exchange and its caller.
//!
//! The writer half is moved into a [`MemoryContext`](super::MemoryContext);
//! the waiter half stays with whoever issued the internal request. The
//! signal is level-triggered: once completed it stays completed, later
//! completions are ignored, and completing with nobody waiting is fine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::context::ContextError;

/// Create a connected signal/waiter pair.
pub fn completion_channel() -> (CompletionSignal, CompletionWaiter) {
    let (tx, rx) = watch::channel(None);
    (CompletionSignal { tx: Arc::new(tx) }, CompletionWaiter { rx })
}

/// Writer half. Cloning shares the same underlying signal.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<Option<Arc<[u8]>>>>,
}

impl CompletionSignal {
    /// Mark the exchange finished with the given response bytes.
    ///
    /// Returns `false` if the signal had already been completed, in which
    /// case the first response is kept.
    pub fn complete(&self, response: Vec<u8>) -> bool {
        let mut response = Some(Arc::<[u8]>::from(response));
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = response.take();
            true
        })
    }

    pub fn is_complete(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Waiter half.
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: watch::Receiver<Option<Arc<[u8]>>>,
}

impl CompletionWaiter {
    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait until the exchange completes and return the captured response.
    ///
    /// Resolves immediately if completion already happened, so there is no
    /// missed-wakeup window between closure and the call to `wait`.
    pub async fn wait(&mut self) -> Result<Vec<u8>, ContextError> {
        match self.rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => Ok(slot.as_deref().map(<[u8]>::to_vec).unwrap_or_default()),
            Err(_) => Err(ContextError::Abandoned),
        }
    }

    /// [`wait`](Self::wait) with a deadline.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, ContextError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ContextError::TimedOut(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_after_completion_returns_immediately() {
        let (signal, mut waiter) = completion_channel();
        assert!(signal.complete(b"done".to_vec()));
        assert!(waiter.is_complete());
        assert_eq!(waiter.wait().await.unwrap(), b"done");
    }

    #[tokio::test]
    async fn second_completion_is_ignored() {
        let (signal, mut waiter) = completion_channel();
        assert!(signal.complete(b"first".to_vec()));
        assert!(!signal.complete(b"second".to_vec()));
        assert_eq!(waiter.wait().await.unwrap(), b"first");
    }

    #[test]
    fn complete_without_waiter() {
        let (signal, waiter) = completion_channel();
        drop(waiter);
        assert!(signal.complete(Vec::new()));
        assert!(signal.is_complete());
    }

    #[tokio::test]
    async fn dropped_signal_abandons_waiter() {
        let (signal, mut waiter) = completion_channel();
        drop(signal);
        assert!(matches!(waiter.wait().await, Err(ContextError::Abandoned)));
    }

    #[tokio::test]
    async fn wait_timeout_expires() {
        let (_signal, mut waiter) = completion_channel();
        let result = waiter.wait_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ContextError::TimedOut(_))));
    }
}
