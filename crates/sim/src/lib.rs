use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlantStatus {
    Off,
    Ready,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    On,
    Off,
    Fault,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommsStatus {
    Normal,
    Degraded,
    Lost,
}

/// Subsystems a trainer can inject a fault into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Ventilation,
    GasAnalysis,
    Lighting,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Ventilation, Component::GasAnalysis, Component::Lighting];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Ventilation => "ventilation",
            Component::GasAnalysis => "gas_analysis",
            Component::Lighting => "lighting",
        }
    }
}

/// Boolean switches on the trainer console.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleKey {
    AutoRamp,
    EStop,
    Loto,
}

impl ToggleKey {
    pub const ALL: [ToggleKey; 3] = [ToggleKey::AutoRamp, ToggleKey::EStop, ToggleKey::Loto];

    pub fn as_str(self) -> &'static str {
        match self {
            ToggleKey::AutoRamp => "auto_ramp",
            ToggleKey::EStop => "e_stop",
            ToggleKey::Loto => "loto",
        }
    }
}

/// Numeric values a trainer can overwrite directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderKey {
    O2,
    Co,
    Ch4Lel,
    Pressure,
    Temperature,
    ThrO2Low,
    ThrCoHigh,
    ThrCh4LelHigh,
}

impl SliderKey {
    pub const ALL: [SliderKey; 8] = [
        SliderKey::O2,
        SliderKey::Co,
        SliderKey::Ch4Lel,
        SliderKey::Pressure,
        SliderKey::Temperature,
        SliderKey::ThrO2Low,
        SliderKey::ThrCoHigh,
        SliderKey::ThrCh4LelHigh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SliderKey::O2 => "o2",
            SliderKey::Co => "co",
            SliderKey::Ch4Lel => "ch4_lel",
            SliderKey::Pressure => "pressure",
            SliderKey::Temperature => "temperature",
            SliderKey::ThrO2Low => "thr_o2_low",
            SliderKey::ThrCoHigh => "thr_co_high",
            SliderKey::ThrCh4LelHigh => "thr_ch4_lel_high",
        }
    }

    /// Advisory (min, max) range offered by the console slider.
    pub fn range(self) -> (f64, f64) {
        match self {
            SliderKey::O2 | SliderKey::ThrO2Low => (15.0, 22.0),
            SliderKey::Co | SliderKey::ThrCoHigh => (0.0, 100.0),
            SliderKey::Ch4Lel | SliderKey::ThrCh4LelHigh => (0.0, 5.0),
            SliderKey::Pressure => (0.8, 1.2),
            SliderKey::Temperature => (-10.0, 40.0),
        }
    }

    /// Slider step, also used as the display precision hint.
    pub fn step(self) -> f64 {
        match self {
            SliderKey::Co | SliderKey::ThrCoHigh => 1.0,
            SliderKey::Pressure => 0.01,
            _ => 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warn,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => f.write_str("WARN"),
            Severity::Critical => f.write_str("CRITICAL"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmCode {
    #[serde(rename = "O2_LOW")]
    O2Low,
    #[serde(rename = "CO_HIGH")]
    CoHigh,
    #[serde(rename = "GAS_HIGH")]
    GasHigh,
}

impl AlarmCode {
    /// Evaluation order; the first new code in this order is the one announced.
    pub const ALL: [AlarmCode; 3] = [AlarmCode::O2Low, AlarmCode::CoHigh, AlarmCode::GasHigh];

    pub fn as_str(self) -> &'static str {
        match self {
            AlarmCode::O2Low => "O2_LOW",
            AlarmCode::CoHigh => "CO_HIGH",
            AlarmCode::GasHigh => "GAS_HIGH",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn severity(self) -> Severity {
        match self {
            AlarmCode::O2Low | AlarmCode::CoHigh => Severity::Warn,
            AlarmCode::GasHigh => Severity::Critical,
        }
    }
}

impl fmt::Display for AlarmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived alarm. Two alarms are equal when they carry the same code;
/// use [`Alarm::same_fields`] to compare the full record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alarm {
    pub severity: Severity,
    pub code: AlarmCode,
    pub message: String,
}

impl Alarm {
    pub fn new(code: AlarmCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            message: message.into(),
        }
    }

    pub fn same_fields(&self, other: &Alarm) -> bool {
        self.code == other.code && self.severity == other.severity && self.message == other.message
    }
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Alarm {}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub o2_low: f64,
    pub co_high: f64,
    pub ch4_lel_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            o2_low: 19.5,
            co_high: 30.0,
            ch4_lel_high: 1.0,
        }
    }
}

/// Per-tick drift applied while ventilation is faulted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampParams {
    pub o2_step: f64,
    pub co_step: f64,
    pub ch4_lel_step: f64,
}

impl Default for RampParams {
    fn default() -> Self {
        Self {
            o2_step: 0.02,
            co_step: 1.0,
            ch4_lel_step: 0.02,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub plant_status: PlantStatus,
    pub ventilation: ComponentStatus,
    pub gas_analysis: ComponentStatus,
    pub lighting: ComponentStatus,
    /// %
    pub o2: f64,
    /// ppm
    pub co: f64,
    /// %LEL
    pub ch4_lel: f64,
    /// bar
    pub pressure: f64,
    /// °C
    pub temperature: f64,
    pub e_stop: bool,
    pub loto: bool,
    pub comms_status: CommsStatus,
    /// Seconds left in the evacuation countdown, 0 when idle.
    pub evacuation_timer: u32,
    pub active_alarms: Vec<Alarm>,
    pub auto_ramp_enabled: bool,
    pub thresholds: Thresholds,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::initial(Thresholds::default())
    }
}

impl SimulationState {
    /// Plant powered down, all subsystems off, clean atmosphere.
    pub fn initial(thresholds: Thresholds) -> Self {
        Self {
            plant_status: PlantStatus::Off,
            ventilation: ComponentStatus::Off,
            gas_analysis: ComponentStatus::Off,
            lighting: ComponentStatus::Off,
            o2: 20.9,
            co: 5.0,
            ch4_lel: 0.1,
            pressure: 1.01,
            temperature: 18.0,
            e_stop: false,
            loto: false,
            comms_status: CommsStatus::Normal,
            evacuation_timer: 0,
            active_alarms: Vec::new(),
            auto_ramp_enabled: false,
            thresholds,
        }
    }

    /// Scenario 3: plant running with every subsystem on and a slightly degraded atmosphere.
    pub fn scenario_3(thresholds: Thresholds) -> Self {
        Self {
            plant_status: PlantStatus::Running,
            ventilation: ComponentStatus::On,
            gas_analysis: ComponentStatus::On,
            lighting: ComponentStatus::On,
            o2: 20.7,
            co: 8.0,
            ch4_lel: 0.3,
            pressure: 1.02,
            temperature: 19.0,
            ..Self::initial(thresholds)
        }
    }

    pub fn component(&self, c: Component) -> ComponentStatus {
        match c {
            Component::Ventilation => self.ventilation,
            Component::GasAnalysis => self.gas_analysis,
            Component::Lighting => self.lighting,
        }
    }

    pub fn component_mut(&mut self, c: Component) -> &mut ComponentStatus {
        match c {
            Component::Ventilation => &mut self.ventilation,
            Component::GasAnalysis => &mut self.gas_analysis,
            Component::Lighting => &mut self.lighting,
        }
    }

    pub fn toggle(&self, k: ToggleKey) -> bool {
        match k {
            ToggleKey::AutoRamp => self.auto_ramp_enabled,
            ToggleKey::EStop => self.e_stop,
            ToggleKey::Loto => self.loto,
        }
    }

    pub fn toggle_mut(&mut self, k: ToggleKey) -> &mut bool {
        match k {
            ToggleKey::AutoRamp => &mut self.auto_ramp_enabled,
            ToggleKey::EStop => &mut self.e_stop,
            ToggleKey::Loto => &mut self.loto,
        }
    }

    pub fn slider(&self, k: SliderKey) -> f64 {
        match k {
            SliderKey::O2 => self.o2,
            SliderKey::Co => self.co,
            SliderKey::Ch4Lel => self.ch4_lel,
            SliderKey::Pressure => self.pressure,
            SliderKey::Temperature => self.temperature,
            SliderKey::ThrO2Low => self.thresholds.o2_low,
            SliderKey::ThrCoHigh => self.thresholds.co_high,
            SliderKey::ThrCh4LelHigh => self.thresholds.ch4_lel_high,
        }
    }

    pub fn slider_mut(&mut self, k: SliderKey) -> &mut f64 {
        match k {
            SliderKey::O2 => &mut self.o2,
            SliderKey::Co => &mut self.co,
            SliderKey::Ch4Lel => &mut self.ch4_lel,
            SliderKey::Pressure => &mut self.pressure,
            SliderKey::Temperature => &mut self.temperature,
            SliderKey::ThrO2Low => &mut self.thresholds.o2_low,
            SliderKey::ThrCoHigh => &mut self.thresholds.co_high,
            SliderKey::ThrCh4LelHigh => &mut self.thresholds.ch4_lel_high,
        }
    }

    pub fn evacuating(&self) -> bool {
        self.evacuation_timer > 0
    }

    /// Auto-ramp drifts only a running plant with faulted ventilation and the ramp switched on.
    pub fn ramp_active(&self) -> bool {
        self.plant_status == PlantStatus::Running
            && self.ventilation == ComponentStatus::Fault
            && self.auto_ramp_enabled
    }

    /// One auto-ramp step. Returns true if the readings moved.
    ///
    /// O2 and CH4 are kept to 2 decimals, CO to whole ppm. O2 is floored at 0 and
    /// CH4 capped at 100 %LEL.
    pub fn ramp(&mut self, p: &RampParams) -> bool {
        if !self.ramp_active() {
            return false;
        }

        self.o2 = round_to(self.o2 - p.o2_step, 2).max(0.0);
        self.co = round_to(self.co + p.co_step, 0);
        self.ch4_lel = round_to(self.ch4_lel + p.ch4_lel_step, 2).min(100.0);

        true
    }
}

/// Round to a fixed number of decimals.
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogSource {
    Trainer,
    Hmi,
    System,
    AutoRamp,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::Trainer => "TRAINER",
            LogSource::Hmi => "HMI",
            LogSource::System => "SYSTEM",
            LogSource::AutoRamp => "AUTO_RAMP",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. Never mutated after it is appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Logical tick at which the entry was written.
    pub tick: u64,
    pub timestamp: DateTime<Local>,
    pub source: LogSource,
    pub event: String,
    pub detail: String,
}
