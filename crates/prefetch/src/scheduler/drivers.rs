//! Pure decisions behind the two orchestrator drivers.
//!
//! Both are functions of the current state (plus, for pacing, the edge
//! detector's memory), so re-evaluating them on an unchanged state is a no-op.

use super::state::{CategoryStatus, SchedulerState};

/// What the advancement driver should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Start resolving this category.
    Load(String),
    /// Re-assert the terminal status of `name` so `prepared_count` catches up
    /// with the terminal prefix.
    Settle {
        name: String,
        status: CategoryStatus,
        prepared_count: usize,
    },
    Idle,
}

/// Decide the advancement driver's next step.
pub fn next_action(state: &SchedulerState) -> Advance {
    if state.in_flight || state.requested_count <= state.prepared_count {
        return Advance::Idle;
    }

    // a category left loading by a failed run holds the rest of the window
    if state.loading_count() > 0 {
        return Advance::Idle;
    }

    if let Some(name) = state.next_pending() {
        return Advance::Load(name.to_string());
    }

    let prefix = state.terminal_prefix();
    if prefix > state.prepared_count {
        let name = &state.queue[prefix - 1];
        if let Some(status) = state.status(name) {
            return Advance::Settle {
                name: name.clone(),
                status: status.clone(),
                prepared_count: prefix,
            };
        }
    }

    Advance::Idle
}

/// Edge detector over the proximity signal.
///
/// Fires once per rising edge; the next falling edge re-arms it. With
/// `rearm_on_progress`, reaching `prepared_count == requested_count` while the
/// signal is still high also re-arms it.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    last: bool,
    armed: bool,
    rearm_on_progress: bool,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(false)
    }
}

impl EdgeDetector {
    pub fn new(rearm_on_progress: bool) -> Self {
        Self {
            last: false,
            armed: true,
            rearm_on_progress,
        }
    }

    /// Last signal value observed.
    pub fn last(&self) -> bool {
        self.last
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Forget the signal history. Called on every generation change.
    pub fn reset(&mut self) {
        self.last = false;
        self.armed = true;
    }

    /// Feed one signal sample. Returns the `request_more` target to emit, if any.
    pub fn observe(&mut self, near: bool, state: &SchedulerState) -> Option<usize> {
        let rising = near && !self.last;
        self.last = near;

        if !near {
            self.armed = true;
            return None;
        }
        if !rising && !self.armed {
            return None;
        }
        self.fire(state)
    }

    /// Re-evaluate after a state change while the signal may still be high.
    pub fn on_progress(&mut self, state: &SchedulerState) -> Option<usize> {
        if !self.rearm_on_progress || !self.last || self.armed {
            return None;
        }
        if state.prepared_count >= state.requested_count {
            self.armed = true;
            return self.fire(state);
        }
        None
    }

    fn fire(&mut self, state: &SchedulerState) -> Option<usize> {
        if !self.armed {
            return None;
        }
        self.armed = false;
        if !state.has_more() {
            return None;
        }
        let target = (state.requested_count + 1).min(state.queue.len());
        (target > state.requested_count).then_some(target)
    }
}
