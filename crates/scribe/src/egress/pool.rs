use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{EgressIdentity, OperatorGate};

/// Consecutive failures after which rotation is considered futile.
pub const PAUSE_THRESHOLD: u32 = 3;

/// What the pool decided after a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Switched to the next identity; keep going.
    Rotate,
    /// Too many consecutive failures; halt until an operator resumes.
    Pause,
}

impl ErrorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotate => "rotate",
            Self::Pause => "pause",
        }
    }
}

/// Ordered set of egress identities with volume- and error-driven rotation.
///
/// Counters and the current index belong to the worker. The paused flag lives
/// in the shared [`OperatorGate`] so a supervisor can release it.
///
/// An empty pool means direct connections: [`EgressPool::current`] returns
/// `None` and rotation is a no-op.
#[derive(Debug)]
pub struct EgressPool {
    identities: Vec<EgressIdentity>,
    current_index: usize,
    requests_since_rotation: u32,
    consecutive_errors: u32,
    rotation_interval: u32,
    gate: Arc<OperatorGate>,
    /// Gate release count last accounted for by this pool.
    seen_releases: u64,
}

impl EgressPool {
    /// Create an empty pool rotating every `rotation_interval` successes.
    pub fn new(rotation_interval: u32) -> Self {
        Self::with_gate(rotation_interval, Arc::new(OperatorGate::new()))
    }

    pub fn with_gate(rotation_interval: u32, gate: Arc<OperatorGate>) -> Self {
        let seen_releases = gate.release_count();
        Self {
            identities: Vec::new(),
            current_index: 0,
            requests_since_rotation: 0,
            consecutive_errors: 0,
            rotation_interval: rotation_interval.max(1),
            gate,
            seen_releases,
        }
    }

    /// Replace the identity list and restart the rotation sequence.
    ///
    /// Does not touch the paused state.
    pub fn load(&mut self, identities: Vec<EgressIdentity>) {
        self.identities = identities;
        self.current_index = 0;
        self.requests_since_rotation = 0;
        self.consecutive_errors = 0;
        info!(count = self.identities.len(), "Loaded egress identities");
    }

    pub fn current(&self) -> Option<&EgressIdentity> {
        self.identities.get(self.current_index)
    }

    pub fn rotate(&mut self) {
        if self.identities.is_empty() {
            return;
        }
        self.current_index = (self.current_index + 1) % self.identities.len();
        self.requests_since_rotation = 0;
        debug!(
            index = self.current_index,
            identity = %self.identities[self.current_index],
            "Rotated egress identity"
        );
    }

    /// Record a successful request. Returns `true` if it triggered a rotation.
    pub fn report_success(&mut self) -> bool {
        self.observe_release();
        self.requests_since_rotation += 1;
        self.consecutive_errors = 0;

        if self.requests_since_rotation >= self.rotation_interval {
            self.rotate();
            return !self.identities.is_empty();
        }
        false
    }

    /// Record a failed request. Always rotates; pauses once failures pile up.
    ///
    /// A resume issued while the request was in flight clears the streak
    /// before this failure is counted.
    pub fn report_error(&mut self) -> ErrorAction {
        self.observe_release();
        self.consecutive_errors += 1;
        self.rotate();

        if self.consecutive_errors >= PAUSE_THRESHOLD {
            self.gate.close();
            warn!(
                consecutive_errors = self.consecutive_errors,
                "Egress pool paused, waiting for operator"
            );
            return ErrorAction::Pause;
        }
        ErrorAction::Rotate
    }

    /// Lift the pause and clear the failure streak.
    pub fn resume(&mut self) {
        self.gate.release();
        self.consecutive_errors = 0;
        self.seen_releases = self.gate.release_count();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Account for a resume issued through the shared gate.
    ///
    /// Returns `true` if a release happened since the last call, in which case
    /// the failure streak has been cleared.
    pub(crate) fn observe_release(&mut self) -> bool {
        let releases = self.gate.release_count();
        if releases == self.seen_releases {
            return false;
        }
        self.seen_releases = releases;
        self.consecutive_errors = 0;
        true
    }

    pub fn gate(&self) -> &Arc<OperatorGate> {
        &self.gate
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn requests_since_rotation(&self) -> u32 {
        self.requests_since_rotation
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn rotation_interval(&self) -> u32 {
        self.rotation_interval
    }
}
