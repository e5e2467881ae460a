//! Cooperative Cancellation
//!
//! A single-shot signal scoped to one run. The engine owns the
//! [`CancellationSource`]; step bodies receive a [`CancellationSignal`] and
//! check it at entry and at every suspension point.

use tokio::sync::watch;

use crate::error::Cancelled;

/// Owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancellationSource {
    sender: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Returns a signal observing this source.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that is never cancelled.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Returns `Err(Cancelled)` if the signal has fired.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is signalled.
    ///
    /// Never resolves if the source is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let observed = receiver.wait_for(|cancelled| *cancelled).await.map(|_| ());
        if observed.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_starts_clear() {
        let source = CancellationSource::new();
        let signal = source.signal();

        assert!(!source.is_cancelled());
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());
    }

    #[test]
    fn test_cancel_is_observed() {
        let source = CancellationSource::new();
        let signal = source.signal();

        source.cancel();
        source.cancel();

        assert!(signal.is_cancelled());
        assert_eq!(signal.check(), Err(Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let source = CancellationSource::new();
        let signal = source.signal();

        let waiter = tokio::spawn(async move { signal.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation should wake the waiter")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let signal = CancellationSignal::never();
        assert!(!signal.is_cancelled());

        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
