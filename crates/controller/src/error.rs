use std::path::PathBuf;

use thiserror::Error;

/// A command that was rejected before touching the simulation.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("unknown toggle '{0}'")]
    UnknownToggle(String),

    #[error("unknown slider '{0}'")]
    UnknownSlider(String),

    #[error("unknown alarm code '{0}'")]
    UnknownAlarm(String),

    #[error("unknown command source '{0}'")]
    UnknownSource(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid tick marker '{0}'")]
    InvalidTick(String),

    #[error("{key} value {value} is not finite")]
    NotFinite { key: &'static str, value: f64 },

    #[error("{key} value {value} is outside [{min}, {max}]")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Playback failure reported by an audio sink. Never fatal to the simulation.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("playback not allowed: {0}")]
    NotAllowed(String),
}
