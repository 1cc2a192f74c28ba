//! Background lease renewal

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::LockError;
use crate::lock::{LeaseState, Lock};

/// Background task keeping a [`Lock`]'s lease alive across a long critical
/// section.
///
/// Every `interval` the task refreshes the lease, each refresh bounded by
/// the lock's per-call timeout. A timed-out refresh is retried immediately
/// up to `max_retries` times. Any other failure (ownership lost, transport
/// error, retries exhausted) is terminal: it is delivered once on a
/// single-slot error channel and the task exits. The channel closes
/// after the one outcome, and on a clean stop, so [`AutoRenewer::wait`]
/// always observes that renewal ended.
///
/// The renewer never releases the lock. Stop it *before* releasing in the
/// normal path; a terminal error then unambiguously means the lease was
/// lost while it was still wanted.
pub struct AutoRenewer {
    stop_tx: mpsc::Sender<()>,
    err_rx: mpsc::Receiver<LockError>,
    handle: JoinHandle<()>,
}

impl AutoRenewer {
    /// Spawn the renewal task. `interval` should be meaningfully shorter
    /// than the lock's lease duration; that is the caller's responsibility.
    pub fn spawn(lock: &Lock, interval: Duration, max_retries: u32) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);

        let state = lock.state.clone();
        let handle = tokio::spawn(renew_loop(state, interval, max_retries, stop_rx, err_tx));

        Self {
            stop_tx,
            err_rx,
            handle,
        }
    }

    /// Wait for the terminal outcome. `Some(err)` is the renewer's one
    /// terminal failure; `None` means the channel closed without one (the
    /// task was stopped, or the failure was already consumed).
    pub async fn wait(&mut self) -> Option<LockError> {
        self.err_rx.recv().await
    }

    /// Terminal failure if one has already been delivered, without
    /// blocking.
    pub fn failed(&mut self) -> Option<LockError> {
        self.err_rx.try_recv().ok()
    }

    /// Signal the task to stop and wait for it to exit. Stopping does not
    /// wait for a pending tick; the signal interrupts it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.handle.await;
    }
}

async fn renew_loop(
    state: Arc<LeaseState>,
    interval: Duration,
    max_retries: u32,
    mut stop_rx: mpsc::Receiver<()>,
    err_tx: mpsc::Sender<LockError>,
) {
    // First tick after one full interval, not immediately
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                debug!(key = %state.key, "Auto-renewal stopped");
                return;
            }
            _ = ticker.tick() => {
                if let Err(err) = renew_with_retries(&state, max_retries).await {
                    warn!(key = %state.key, error = %err, "Auto-renewal failed terminally");
                    let _ = err_tx.send(err).await;
                    return;
                }
            }
        }
    }
}

/// One renewal round: a refresh, plus up to `max_retries` immediate
/// retries when the refresh times out. Ownership loss and transport
/// errors stop the retrying at once.
async fn renew_with_retries(state: &Arc<LeaseState>, max_retries: u32) -> Result<(), LockError> {
    match state.refresh_once().await {
        Ok(()) => return Ok(()),
        Err(LockError::Timeout) => {}
        Err(err) => return Err(err),
    }

    for _ in 0..max_retries {
        match state.refresh_once().await {
            Ok(()) => {
                debug!(key = %state.key, "Lease renewal recovered after timeout");
                return Ok(());
            }
            Err(LockError::Timeout) => {}
            Err(err) => return Err(err),
        }
    }

    Err(LockError::Timeout)
}
