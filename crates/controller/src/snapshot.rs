use safety::AlarmBanner;
use serde::{Deserialize, Serialize};
use sim::{LogEntry, PlantStatus, SimulationState};

/// Who is looking at the plant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructor console; always sees ground truth.
    Trainer,
    /// Student HMI; subject to the comms overlay.
    Hmi,
}

/// Which commands the console should offer. Advisory only: the engine does
/// not re-check these.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub start_scenario: bool,
    pub inject_fault: bool,
    pub shutdown: bool,
    pub reset: bool,
    pub request_support: bool,
}

impl Controls {
    pub fn for_role(role: Role, state: &SimulationState) -> Self {
        let emergency = safety::is_emergency(state);
        match role {
            Role::Trainer => Controls {
                start_scenario: true,
                inject_fault: state.plant_status != PlantStatus::Off,
                shutdown: state.plant_status != PlantStatus::Off && !emergency,
                reset: true,
                request_support: false,
            },
            Role::Hmi => Controls {
                start_scenario: false,
                inject_fault: false,
                shutdown: safety::has_critical_alarm(state)
                    && !emergency
                    && state.plant_status == PlantStatus::Running,
                reset: false,
                request_support: !emergency,
            },
        }
    }
}

/// Read-only view handed to a presentation layer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub role: Role,
    pub tick: u64,
    pub state: SimulationState,
    /// Most recent first.
    pub log: Vec<LogEntry>,
    pub emergency: bool,
    pub critical_alarm: bool,
    pub banner: AlarmBanner,
    pub controls: Controls,
    pub muted: bool,
}
