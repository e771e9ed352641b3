use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::error::AudioError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioCue {
    Warning,
    Critical,
    Click,
    EvacuationLoopStart,
    EvacuationLoopStop,
}

impl AudioCue {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCue::Warning => "warning",
            AudioCue::Critical => "critical",
            AudioCue::Click => "click",
            AudioCue::EvacuationLoopStart => "evacuation-loop-start",
            AudioCue::EvacuationLoopStop => "evacuation-loop-stop",
        }
    }

    /// Stop cues still go out while muted so a loop never keeps running.
    pub fn silences(self) -> bool {
        matches!(self, AudioCue::EvacuationLoopStop)
    }
}

/// Playback collaborator. Implementations must return quickly; failures are
/// reported but never affect the simulation.
pub trait AudioSink: Send {
    fn play(&mut self, cue: AudioCue) -> Result<(), AudioError>;
}

/// Writes cues to the diagnostic log instead of a sound device.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAudio;

impl AudioSink for TracingAudio {
    fn play(&mut self, cue: AudioCue) -> Result<(), AudioError> {
        info!(cue = cue.as_str(), "audio cue");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _cue: AudioCue) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Keeps every cue it receives; clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingAudio {
    cues: Arc<Mutex<Vec<AudioCue>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<AudioCue> {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, cue: AudioCue) -> usize {
        self.cues().into_iter().filter(|c| *c == cue).count()
    }

    pub fn clear(&self) {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, cue: AudioCue) -> Result<(), AudioError> {
        self.cues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cue);
        Ok(())
    }
}

/// The engine's handle on the audio collaborator plus the mute switch.
///
/// One engine runs per process, so this mute switch is process-wide.
pub struct Audio {
    sink: Box<dyn AudioSink>,
    muted: bool,
}

impl Audio {
    pub fn new(sink: impl AudioSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            muted: false,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Play a cue unless muted. Playback errors are returned for the caller to log.
    pub fn play(&mut self, cue: AudioCue) -> Result<(), AudioError> {
        if self.muted && !cue.silences() {
            return Ok(());
        }
        self.sink.play(cue)
    }
}

impl std::fmt::Debug for Audio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Audio").field("muted", &self.muted).finish_non_exhaustive()
    }
}
