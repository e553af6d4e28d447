use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Operator gate shared between the worker and whoever supervises it.
///
/// The worker closes the gate when the egress pool decides to pause. Only an
/// explicit [`OperatorGate::release`] opens it again.
#[derive(Debug, Default)]
pub struct OperatorGate {
    paused: AtomicBool,
    /// Bumped on every release so the worker can tell a resume happened even
    /// if it never observed the paused state itself.
    releases: AtomicU64,
    released: Notify,
}

impl OperatorGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Operator resume: open the gate and wake a waiting worker.
    pub fn release(&self) {
        self.paused.store(false, Ordering::Release);
        self.releases.fetch_add(1, Ordering::AcqRel);
        self.released.notify_waiters();
    }

    pub(crate) fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Acquire)
    }

    /// Resolves on the next [`OperatorGate::release`].
    pub async fn released(&self) {
        self.released.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn close_and_release() {
        let gate = OperatorGate::new();
        assert!(!gate.is_paused());
        gate.close();
        assert!(gate.is_paused());
        gate.release();
        assert!(!gate.is_paused());
        assert_eq!(gate.release_count(), 1);
    }

    #[tokio::test]
    async fn release_wakes_waiter() {
        let gate = Arc::new(OperatorGate::new());
        gate.close();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.released().await })
        };
        tokio::task::yield_now().await;
        gate.release();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }
}
