//! Deferral of inbound protocol calls until the membership service exists.

use tokio_util::sync::CancellationToken;

/// One-shot latch that holds inbound protocol RPCs at the transport
/// boundary.
///
/// The server may accept connections before the membership service that
/// processes them has been constructed. Every protocol handler awaits this
/// latch before dispatching; binding the service releases it, after which
/// calls pass straight through. A held call costs one queued continuation
/// and nothing else. Released calls resume in no particular order.
#[derive(Debug, Clone)]
pub struct DeferredDispatch {
    // The token is used as a wake-all latch: "cancelled" means released.
    released: CancellationToken,
}

impl DeferredDispatch {
    /// Creates a latch in the held state.
    pub fn new() -> Self {
        Self {
            released: CancellationToken::new(),
        }
    }

    /// Suspends until [`release`](Self::release) has been called. Returns
    /// immediately once released.
    pub async fn wait(&self) {
        self.released.cancelled().await;
    }

    /// Releases every held call. Idempotent.
    pub fn release(&self) {
        self.released.cancel();
    }

    /// Whether the latch has been released.
    pub fn is_released(&self) -> bool {
        self.released.is_cancelled()
    }
}

impl Default for DeferredDispatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_wait_blocks_until_released() {
        let dispatch = DeferredDispatch::new();
        assert!(!dispatch.is_released());

        let held = timeout(Duration::from_millis(50), dispatch.wait()).await;
        assert!(held.is_err(), "wait should not complete while held");

        dispatch.release();
        let released = timeout(Duration::from_millis(50), dispatch.wait()).await;
        assert!(released.is_ok(), "wait should complete after release");
    }

    #[tokio::test]
    async fn test_wait_after_release_is_immediate() {
        let dispatch = DeferredDispatch::new();
        dispatch.release();
        assert!(dispatch.is_released());

        dispatch.wait().await;
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dispatch = DeferredDispatch::new();
        dispatch.release();
        dispatch.release();
        assert!(dispatch.is_released());
        dispatch.wait().await;
    }

    #[tokio::test]
    async fn test_releases_all_concurrent_waiters() {
        let dispatch = DeferredDispatch::new();

        let waiters: Vec<_> = (0..16)
            .map(|_| {
                let dispatch = dispatch.clone();
                tokio::spawn(async move { dispatch.wait().await })
            })
            .collect();

        dispatch.release();

        for waiter in waiters {
            timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter released")
                .expect("waiter did not panic");
        }
    }
}
