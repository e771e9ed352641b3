use sim::{CommsStatus, SimulationState};

use crate::timers::TimerHandle;

/// Display-only comms loss for the HMI.
///
/// While engaged, the HMI observes `CommsStatus::Lost`; the canonical state and
/// the trainer's view are never touched.
#[derive(Clone, Debug, Default)]
pub struct CommsOverlay {
    restore: Option<TimerHandle>,
}

impl CommsOverlay {
    pub fn is_engaged(&self) -> bool {
        self.restore.is_some()
    }

    /// Engage the overlay with the task that will lift it. Returns the previous
    /// restore task, which the caller must cancel.
    pub fn engage(&mut self, restore: TimerHandle) -> Option<TimerHandle> {
        self.restore.replace(restore)
    }

    /// Lift the overlay if `handle` is its current restore task.
    pub fn expire(&mut self, handle: TimerHandle) -> bool {
        if self.restore == Some(handle) {
            self.restore = None;
            return true;
        }
        false
    }

    pub fn release(&mut self) {
        self.restore = None;
    }

    pub fn observe(&self, state: &SimulationState) -> SimulationState {
        let mut seen = state.clone();
        if self.is_engaged() {
            seen.comms_status = CommsStatus::Lost;
        }
        seen
    }
}
