use std::time::Instant;

use tokio::sync::oneshot;

use crate::config::ContextOverrides;
use crate::error::PoolError;
use crate::registry::AcquiredContext;

/// Result handed back to a suspended caller once the pool can serve them,
/// times out, or shuts down underneath them.
pub type WaiterResult = Result<AcquiredContext, PoolError>;

/// A pending acquisition that could not be served immediately because every
/// browser handle was saturated and the handle cap was already reached.
///
/// Completed exactly once, by whichever of {a release, the reaper, shutdown,
/// the caller's own cancellation} gets there first.
pub struct Waiter {
    /// Identifies this waiter for removal from the FIFO queue — needed when
    /// the caller cancels locally before the pool ever looks at it again, so
    /// a stale entry doesn't waste a future reconciliation pass.
    pub id: u64,
    pub overrides: ContextOverrides,
    pub deadline: Instant,
    completion: Option<oneshot::Sender<WaiterResult>>,
}

impl Waiter {
    pub fn new(id: u64, overrides: ContextOverrides, deadline: Instant) -> (Self, oneshot::Receiver<WaiterResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id,
                overrides,
                deadline,
                completion: Some(tx),
            },
            rx,
        )
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_none()
    }

    /// Complete the waiter. A no-op if already completed or if the receiver
    /// was dropped (caller cancelled locally before we got to it).
    pub fn complete(&mut self, result: WaiterResult) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiter_completes_exactly_once() {
        let (mut waiter, rx) = Waiter::new(0, ContextOverrides::default(), Instant::now() + Duration::from_secs(1));
        waiter.complete(Err(PoolError::PoolExhausted));
        assert!(waiter.is_completed());
        waiter.complete(Err(PoolError::Cancelled));
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(PoolError::PoolExhausted)));
    }
}
