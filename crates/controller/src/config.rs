use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sim::{RampParams, SliderKey, Thresholds};

use crate::error::{CommandError, ConfigError};

/// What the engine does with slider values outside the console's advisory range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderPolicy {
    /// Write the value unchanged.
    #[default]
    Passthrough,
    /// Clamp into the slider range.
    Clamp,
    /// Refuse the command.
    Reject,
}

impl SliderPolicy {
    /// Value to store for `key`, or the reason it is refused.
    pub fn admit(self, key: SliderKey, value: f64) -> Result<f64, CommandError> {
        if !value.is_finite() {
            return Err(CommandError::NotFinite {
                key: key.as_str(),
                value,
            });
        }

        let (min, max) = key.range();
        match self {
            SliderPolicy::Passthrough => Ok(value),
            SliderPolicy::Clamp => Ok(value.clamp(min, max)),
            SliderPolicy::Reject if value < min || value > max => Err(CommandError::OutOfRange {
                key: key.as_str(),
                value,
                min,
                max,
            }),
            SliderPolicy::Reject => Ok(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Length of the controlled-shutdown countdown, in ticks.
    pub evacuation_seconds: u32,
    /// How long a simulated comms loss masks the HMI, in ticks.
    pub comms_loss_ticks: u64,
    /// Wall-clock tick period.
    pub tick_ms: u64,
    pub slider_policy: SliderPolicy,
    /// Thresholds loaded into the initial and scenario snapshots.
    pub thresholds: Thresholds,
    pub ramp: RampParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            evacuation_seconds: 120,
            comms_loss_ticks: 10,
            tick_ms: 1000,
            slider_policy: SliderPolicy::default(),
            thresholds: Thresholds::default(),
            ramp: RampParams::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evacuation_seconds == 0 {
            return Err(ConfigError::Invalid("evacuation_seconds must be > 0".into()));
        }
        if self.comms_loss_ticks == 0 {
            return Err(ConfigError::Invalid("comms_loss_ticks must be > 0".into()));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be > 0".into()));
        }

        let r = &self.ramp;
        for (name, v) in [
            ("ramp.o2_step", r.o2_step),
            ("ramp.co_step", r.co_step),
            ("ramp.ch4_lel_step", r.ch4_lel_step),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be a finite, non-negative number")));
            }
        }

        let t = &self.thresholds;
        if ![t.o2_low, t.co_high, t.ch4_lel_high].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Invalid("thresholds must be finite".into()));
        }

        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
