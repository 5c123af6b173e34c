//! Single-fire stop latch shared by the timeout watcher, interrupt
//! forwarding, and the polling loop itself.
//!
//! The first reason recorded wins. Later requests are no-ops and report
//! the reason that already won, so two producers racing to stop the run
//! can never both take effect.

use std::sync::Arc;

use tokio::sync::watch;

/// Why a monitoring run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The overall timeout elapsed.
    TimedOut,
    /// An operator interrupt (SIGINT/SIGTERM) was received.
    Interrupted,
    /// The polling loop claimed the run for a breach or a failed query.
    Engine,
}

/// Cloneable handle used to request that a run stop.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Canceller {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason` if no reason has been recorded yet.
    ///
    /// Returns the reason that already won when the latch was set before.
    pub fn claim(&self, reason: StopReason) -> Result<(), StopReason> {
        let mut winner = reason;
        let won = self.tx.send_if_modified(|current| match current {
            None => {
                *current = Some(reason);
                true
            }
            Some(existing) => {
                winner = *existing;
                false
            }
        });
        if won { Ok(()) } else { Err(winner) }
    }

    /// Request a stop. Returns `false` if the run was already stopping.
    pub fn cancel(&self, reason: StopReason) -> bool {
        self.claim(reason).is_ok()
    }

    /// The recorded reason, if any.
    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<StopReason>> {
        self.tx.subscribe()
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until a stop reason is recorded.
pub(crate) async fn stopped(rx: &mut watch::Receiver<Option<StopReason>>) -> StopReason {
    // Copy out of the `Ref` so no borrow is held across an await.
    let recorded = rx.wait_for(Option::is_some).await.map(|reason| *reason);
    match recorded {
        Ok(reason) => reason.unwrap_or(StopReason::Engine),
        // The sender lives as long as any Canceller clone; never resolve otherwise.
        Err(_) => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let canceller = Canceller::new();
        assert!(!canceller.is_cancelled());

        assert!(canceller.cancel(StopReason::TimedOut));
        assert!(!canceller.cancel(StopReason::Interrupted));
        assert_eq!(canceller.reason(), Some(StopReason::TimedOut));
    }

    #[test]
    fn claim_reports_existing_winner() {
        let canceller = Canceller::new();
        assert_eq!(canceller.claim(StopReason::Interrupted), Ok(()));
        assert_eq!(
            canceller.claim(StopReason::Engine),
            Err(StopReason::Interrupted)
        );
    }

    #[test]
    fn repeated_requests_are_harmless() {
        let canceller = Canceller::new();
        for _ in 0..3 {
            canceller.cancel(StopReason::Interrupted);
        }
        assert_eq!(canceller.reason(), Some(StopReason::Interrupted));
    }

    #[test]
    fn clones_share_the_latch() {
        let a = Canceller::new();
        let b = a.clone();
        assert!(b.cancel(StopReason::TimedOut));
        assert!(!a.cancel(StopReason::Interrupted));
        assert_eq!(a.reason(), Some(StopReason::TimedOut));
    }

    #[tokio::test]
    async fn subscriber_wakes_on_cancel() {
        let canceller = Canceller::new();
        let mut rx = canceller.subscribe();

        let remote = canceller.clone();
        tokio::spawn(async move {
            remote.cancel(StopReason::Interrupted);
        });

        assert_eq!(stopped(&mut rx).await, StopReason::Interrupted);
    }

    #[tokio::test]
    async fn subscriber_sees_reason_set_before_subscribing() {
        let canceller = Canceller::new();
        canceller.cancel(StopReason::TimedOut);

        let mut rx = canceller.subscribe();
        assert_eq!(stopped(&mut rx).await, StopReason::TimedOut);
    }
}
