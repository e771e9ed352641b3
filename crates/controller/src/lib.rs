//! Scenario engine for the confined-space training plant.
//!
//! [`Engine`] owns the simulation state, the audit log, pending timers and the
//! audio collaborator. Commands and ticks go through the pure functions in
//! [`kernel`]; the engine only executes the effects they return. [`Session`]
//! drives an engine from a tokio clock for interactive front ends.

mod audio;
mod audit;
mod clock;
mod command;
mod config;
mod effects;
mod engine;
mod error;
pub mod kernel;
mod overlay;
mod snapshot;
mod timers;

pub use audio::{Audio, AudioCue, AudioSink, NullAudio, RecordingAudio, TracingAudio};
pub use audit::AuditLog;
pub use clock::{Clock, Session, SharedEngine};
pub use command::{
    parse_alarm, parse_component, parse_script, parse_slider, parse_source, parse_toggle,
    Command, ScriptLine, Source,
};
pub use config::{SimConfig, SliderPolicy};
pub use effects::Effect;
pub use engine::Engine;
pub use error::{AudioError, CommandError, ConfigError};
pub use overlay::CommsOverlay;
pub use snapshot::{Controls, Role, Snapshot};
pub use timers::{Scheduler, TimerHandle};
