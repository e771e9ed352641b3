use serde::Serialize;
use sim::{Alarm, AlarmCode, PlantStatus, Severity, SimulationState};

/// Alarms implied by the current readings and thresholds.
///
/// A plant that is not running has no alarms. Otherwise each condition is
/// checked independently, in [`AlarmCode::ALL`] order.
pub fn evaluate(state: &SimulationState) -> Vec<Alarm> {
    if state.plant_status != PlantStatus::Running {
        return Vec::new();
    }

    let thr = &state.thresholds;
    let mut alarms = Vec::new();

    if state.o2 < thr.o2_low {
        alarms.push(Alarm::new(
            AlarmCode::O2Low,
            format!("O2 below threshold ({}%)", state.o2),
        ));
    }
    if state.co > thr.co_high {
        alarms.push(Alarm::new(
            AlarmCode::CoHigh,
            format!("CO above threshold ({} ppm)", state.co),
        ));
    }
    if state.ch4_lel > thr.ch4_lel_high {
        alarms.push(Alarm::new(
            AlarmCode::GasHigh,
            format!("CH4 above threshold ({}% LEL)", state.ch4_lel),
        ));
    }

    alarms
}

/// Outcome of one alarm recomputation.
#[derive(Clone, Debug, Default)]
pub struct AlarmUpdate {
    /// The active set was replaced.
    pub changed: bool,
    /// First alarm whose code was absent before, if any.
    pub raised: Option<Alarm>,
}

fn same_set(a: &[Alarm], b: &[Alarm]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_fields(y))
}

/// Re-derive `active_alarms`, replacing the set only when it differs.
pub fn recompute(state: &mut SimulationState) -> AlarmUpdate {
    let next = evaluate(state);
    if same_set(&next, &state.active_alarms) {
        return AlarmUpdate::default();
    }

    let raised = next
        .iter()
        .find(|a| !state.active_alarms.contains(a))
        .cloned();
    state.active_alarms = next;

    AlarmUpdate {
        changed: true,
        raised,
    }
}

/// Drop a single alarm code from the active set. Returns true if it was present.
pub fn clear(state: &mut SimulationState, code: AlarmCode) -> bool {
    let before = state.active_alarms.len();
    state.active_alarms.retain(|a| a.code != code);
    state.active_alarms.len() != before
}

/// Any interlock engaged or an evacuation in progress.
pub fn is_emergency(state: &SimulationState) -> bool {
    state.e_stop || state.loto || state.evacuating()
}

pub fn has_critical_alarm(state: &SimulationState) -> bool {
    state
        .active_alarms
        .iter()
        .any(|a| a.severity == Severity::Critical)
}

/// Worst active severity, as shown on the HMI banner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmBanner {
    None,
    Warn,
    Critical,
}

pub fn banner(state: &SimulationState) -> AlarmBanner {
    match state.active_alarms.iter().map(|a| a.severity).max() {
        Some(Severity::Critical) => AlarmBanner::Critical,
        Some(Severity::Warn) => AlarmBanner::Warn,
        None => AlarmBanner::None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvacuationPhase {
    Idle,
    Counting { remaining: u32 },
}

pub fn phase(state: &SimulationState) -> EvacuationPhase {
    match state.evacuation_timer {
        0 => EvacuationPhase::Idle,
        remaining => EvacuationPhase::Counting { remaining },
    }
}

/// Arm the evacuation countdown. Only an idle sequencer can be armed.
pub fn arm_evacuation(state: &mut SimulationState, seconds: u32) -> bool {
    if state.evacuating() || seconds == 0 {
        return false;
    }
    state.evacuation_timer = seconds;
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvacuationStep {
    Idle,
    Counting { remaining: u32 },
    /// The countdown hit zero on this step and the plant was shut off.
    Completed,
}

/// Advance the countdown by one second.
///
/// Completion happens on exactly one step: once the timer is 0 the sequencer is
/// idle again and further steps are no-ops.
pub fn advance_evacuation(state: &mut SimulationState) -> EvacuationStep {
    if !state.evacuating() {
        return EvacuationStep::Idle;
    }

    state.evacuation_timer -= 1;
    if state.evacuation_timer > 0 {
        return EvacuationStep::Counting {
            remaining: state.evacuation_timer,
        };
    }

    state.plant_status = PlantStatus::Off;
    EvacuationStep::Completed
}
