use chrono::Local;
use sim::{LogSource, SimulationState};
use tracing::{debug, info, warn};

use crate::audio::{Audio, AudioCue, AudioSink};
use crate::audit::AuditLog;
use crate::command::Command;
use crate::config::SimConfig;
use crate::effects::Effect;
use crate::error::CommandError;
use crate::kernel;
use crate::overlay::CommsOverlay;
use crate::snapshot::{Controls, Role, Snapshot};
use crate::timers::Scheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    RestoreComms,
}

/// Owns the simulation and serializes every transition through it.
#[derive(Debug)]
pub struct Engine {
    config: SimConfig,
    state: SimulationState,
    log: AuditLog,
    overlay: CommsOverlay,
    scheduler: Scheduler<Task>,
    audio: Audio,
    tick: u64,
}

impl Engine {
    pub fn new(config: SimConfig, audio: impl AudioSink + 'static) -> Self {
        let state = SimulationState::initial(config.thresholds);
        Self {
            config,
            state,
            log: AuditLog::new(),
            overlay: CommsOverlay::default(),
            scheduler: Scheduler::new(),
            audio: Audio::new(audio),
            tick: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ground truth, as the trainer sees it.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    /// Ticks completed since the engine was created.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn comms_frozen(&self) -> bool {
        self.overlay.is_engaged()
    }

    pub fn is_muted(&self) -> bool {
        self.audio.is_muted()
    }

    /// State as observed from `role`.
    pub fn observe(&self, role: Role) -> SimulationState {
        match role {
            Role::Trainer => self.state.clone(),
            Role::Hmi => self.overlay.observe(&self.state),
        }
    }

    pub fn snapshot(&self, role: Role) -> Snapshot {
        Snapshot {
            role,
            tick: self.tick,
            state: self.observe(role),
            log: self.log.to_vec(),
            emergency: safety::is_emergency(&self.state),
            critical_alarm: safety::has_critical_alarm(&self.state),
            banner: safety::banner(&self.state),
            controls: Controls::for_role(role, &self.state),
            muted: self.audio.is_muted(),
        }
    }

    /// Apply a command. A rejected command leaves state and log untouched.
    pub fn execute(&mut self, cmd: Command) -> Result<(), CommandError> {
        let (next, effects) = match kernel::apply(&self.state, &cmd, &self.config) {
            Ok(t) => t,
            Err(e) => {
                warn!(?cmd, error = %e, "command rejected");
                return Err(e);
            }
        };

        debug!(?cmd, effects = effects.len(), "command applied");
        self.state = next;
        self.run(effects);
        Ok(())
    }

    /// Advance the simulation by one second.
    pub fn tick(&mut self) {
        self.tick += 1;

        let (next, effects) = kernel::tick(&self.state, &self.config);
        self.state = next;
        self.run(effects);

        for (handle, task) in self.scheduler.take_due(self.tick) {
            match task {
                Task::RestoreComms => {
                    if self.overlay.expire(handle) {
                        info!(tick = self.tick, "comms overlay lifted");
                        self.append(LogSource::System, "comms_restored", "Communications restored.");
                    }
                }
            }
        }

        debug!(
            tick = self.tick,
            o2 = self.state.o2,
            co = self.state.co,
            ch4_lel = self.state.ch4_lel,
            evacuation = self.state.evacuation_timer,
            next_timer = ?self.scheduler.next_due(),
            "tick"
        );
    }

    fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Log {
                    source,
                    event,
                    detail,
                } => self.append(source, event, detail),
                Effect::Cue(cue) => self.play(cue),
                Effect::ClearLog => self.log.clear(),
                Effect::CancelScheduled => {
                    let n = self.scheduler.cancel_all();
                    self.overlay.release();
                    debug!(cancelled = n, "scheduled tasks cancelled");
                }
                Effect::FreezeComms => {
                    let due = self.tick + self.config.comms_loss_ticks;
                    let handle = self.scheduler.schedule(due, Task::RestoreComms);
                    if let Some(stale) = self.overlay.engage(handle) {
                        self.scheduler.cancel(stale);
                        debug!(due, "comms overlay window restarted");
                    }
                }
                Effect::ToggleMute => self.toggle_mute(),
            }
        }
    }

    fn toggle_mute(&mut self) {
        let muted = !self.audio.is_muted();
        if muted {
            self.play(AudioCue::EvacuationLoopStop);
        }
        self.audio.set_muted(muted);
        if !muted && self.state.evacuating() {
            self.play(AudioCue::EvacuationLoopStart);
        }

        let detail = if muted { "Audio muted" } else { "Audio unmuted" };
        self.append(LogSource::System, "audio_toggle", detail);
    }

    fn append(&mut self, source: LogSource, event: impl Into<String>, detail: impl Into<String>) {
        let entry = self.log.append(self.tick, Local::now(), source, event, detail);
        debug!(
            source = %entry.source,
            event = %entry.event,
            detail = %entry.detail,
            "audit"
        );
    }

    fn play(&mut self, cue: AudioCue) {
        if let Err(e) = self.audio.play(cue) {
            warn!(cue = cue.as_str(), error = %e, "audio cue failed");
        }
    }
}
