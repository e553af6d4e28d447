use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::egress::{EgressIdentity, OperatorGate};

/// Lifecycle of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    /// Halted after repeated failures until an operator resumes.
    PausedForOperator,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PausedForOperator => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct Shared {
    cancel: CancellationToken,
    gate: Arc<OperatorGate>,
    pending_reload: Mutex<Option<Vec<EgressIdentity>>>,
    state: watch::Sender<RunState>,
}

/// Cloneable remote control for a running collection.
///
/// Everything here is safe to call from any task or thread while the worker
/// runs. Requests are picked up at the worker's next checkpoint.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    inner: Arc<Shared>,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            inner: Arc::new(Shared {
                cancel: CancellationToken::new(),
                gate: Arc::new(OperatorGate::new()),
                pending_reload: Mutex::new(None),
                state,
            }),
        }
    }

    /// Ask the run to stop. Whatever was collected so far is still flushed.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Operator resume after a pause. Also clears the failure streak.
    pub fn resume(&self) {
        self.inner.gate.release();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.gate.is_paused()
    }

    /// Queue a replacement identity list. The latest request wins.
    pub fn reload_identities(&self, identities: Vec<EgressIdentity>) {
        *self.inner.pending_reload.lock() = Some(identities);
    }

    /// Size of the identity list still waiting for the worker, if any.
    pub fn pending_reload(&self) -> Option<usize> {
        self.inner.pending_reload.lock().as_ref().map(Vec::len)
    }

    pub fn state(&self) -> RunState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub(crate) fn gate(&self) -> Arc<OperatorGate> {
        Arc::clone(&self.inner.gate)
    }

    pub(crate) fn take_reload(&self) -> Option<Vec<EgressIdentity>> {
        self.inner.pending_reload.lock().take()
    }

    pub(crate) fn set_state(&self, state: RunState) {
        self.inner.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let handle = ControlHandle::new();
        let other = handle.clone();
        assert_eq!(handle.state(), RunState::Idle);

        other.cancel();
        assert!(handle.is_cancelled());

        handle.set_state(RunState::Running);
        assert_eq!(other.state(), RunState::Running);
    }

    #[test]
    fn latest_reload_wins() {
        let handle = ControlHandle::new();
        handle.reload_identities(vec![EgressIdentity::parse("1.1.1.1:1").unwrap()]);
        handle.reload_identities(vec![
            EgressIdentity::parse("2.2.2.2:2").unwrap(),
            EgressIdentity::parse("3.3.3.3:3").unwrap(),
        ]);
        assert_eq!(handle.pending_reload(), Some(2));
        assert_eq!(handle.take_reload().map(|ids| ids.len()), Some(2));
        assert!(handle.take_reload().is_none());
        assert_eq!(handle.pending_reload(), None);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let handle = ControlHandle::new();
        let mut rx = handle.subscribe();
        handle.set_state(RunState::PausedForOperator);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), RunState::PausedForOperator);
    }
}
