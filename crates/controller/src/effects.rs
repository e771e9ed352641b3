use sim::LogSource;

use crate::audio::AudioCue;

/// Side effects produced by the kernel and carried out by the [`crate::Engine`].
///
/// The kernel only describes what should happen; stamping log entries, playing
/// cues and managing scheduled tasks is the engine's job.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Append an entry to the audit log.
    Log {
        source: LogSource,
        event: String,
        detail: String,
    },
    /// Fire-and-forget audio cue.
    Cue(AudioCue),
    /// Drop every audit entry.
    ClearLog,
    /// Cancel all scheduled tasks and release the comms overlay.
    CancelScheduled,
    /// Start, or restart, the HMI comms-loss window.
    FreezeComms,
    /// Flip the process-wide mute switch.
    ToggleMute,
}

impl Effect {
    pub fn log(source: LogSource, event: impl Into<String>, detail: impl Into<String>) -> Self {
        Effect::Log {
            source,
            event: event.into(),
            detail: detail.into(),
        }
    }
}
