//! Cancellation signal threaded through lock operations

use tokio::sync::watch;

/// Clonable cancellation handle.
///
/// Every public lock operation takes a `&CancelSignal`; a signal that is
/// already set fails the call immediately with
/// [`LockError::Cancelled`](crate::LockError::Cancelled), and the
/// between-retry sleep in acquisition is abandoned the moment the signal
/// fires. Cloning is cheap; all clones observe the same cancellation.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Check whether cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is triggered.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in self, so wait_for can only fail after every
        // clone is dropped, which cannot happen while we hold one.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_observed_by_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();

        assert!(!signal.is_cancelled());
        assert!(!clone.is_cancelled());

        signal.cancel();

        assert!(signal.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let signal = CancelSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        signal.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_set() {
        let signal = CancelSignal::new();
        signal.cancel();
        // Must not hang
        signal.cancelled().await;
    }
}
