//! Pure transition functions.
//!
//! Every command and every tick maps the previous [`SimulationState`] to a new
//! one plus a list of [`Effect`]s. Nothing here touches a clock, the audit log
//! or the audio device.

use sim::{ComponentStatus, LogSource, Severity, SimulationState};

use crate::audio::AudioCue;
use crate::command::{Command, Source};
use crate::config::SimConfig;
use crate::effects::Effect;
use crate::error::CommandError;

/// Apply an operator command.
pub fn apply(
    prev: &SimulationState,
    cmd: &Command,
    cfg: &SimConfig,
) -> Result<(SimulationState, Vec<Effect>), CommandError> {
    let mut state = prev.clone();
    let mut effects = Vec::new();

    match cmd {
        Command::StartScenario => {
            state = SimulationState::scenario_3(cfg.thresholds);
            effects.push(Effect::log(
                LogSource::Trainer,
                "start_scenario_3",
                "Scenario 3 initial state loaded.",
            ));
        }

        Command::InjectFault { component } => {
            *state.component_mut(*component) = ComponentStatus::Fault;
            effects.push(Effect::log(
                LogSource::Trainer,
                format!("inject_fault_{}", component.as_str()),
                format!("Fault injected on {}.", component.as_str()),
            ));
        }

        Command::ControlledShutdown { source } => {
            if *source == Source::Hmi {
                effects.push(Effect::Cue(AudioCue::Click));
            }
            // An evacuation in progress can only be ended by a reset.
            if !safety::arm_evacuation(&mut state, cfg.evacuation_seconds) {
                return Ok((state, effects));
            }
            effects.push(Effect::log(
                (*source).into(),
                "arresto_controllato",
                format!(
                    "Controlled shutdown started ({} s evacuation).",
                    cfg.evacuation_seconds
                ),
            ));
        }

        Command::Reset => {
            state = SimulationState::initial(cfg.thresholds);
            effects.push(Effect::ClearLog);
            effects.push(Effect::CancelScheduled);
            effects.push(Effect::Cue(AudioCue::EvacuationLoopStop));
            effects.push(Effect::log(
                LogSource::Trainer,
                "reset_impianto",
                "Simulation reset to initial state.",
            ));
            settle_alarms(&mut state, &mut effects);
            return Ok((state, effects));
        }

        Command::Toggle { key } => {
            let flag = state.toggle_mut(*key);
            *flag = !*flag;
            let now = *flag;
            effects.push(Effect::log(
                LogSource::Trainer,
                format!("toggle_{}", key.as_str()),
                format!("{} set to {}", key.as_str(), now),
            ));
        }

        Command::SetSlider { key, value } => {
            let value = cfg.slider_policy.admit(*key, *value)?;
            *state.slider_mut(*key) = value;
            effects.push(Effect::log(
                LogSource::Trainer,
                format!("set_{}", key.as_str()),
                format!("{} set to {}", key.as_str(), value),
            ));
        }

        Command::ClearAlarm { code } => {
            safety::clear(&mut state, *code);
            effects.push(Effect::log(
                LogSource::Trainer,
                "clear_alarm",
                format!("Alarm {code} cleared manually."),
            ));
        }

        Command::SimulateCommsLoss => {
            effects.push(Effect::log(
                LogSource::Trainer,
                "sim_comms_loss",
                format!(
                    "Simulating communications loss for {} s.",
                    cfg.comms_loss_ticks
                ),
            ));
            effects.push(Effect::FreezeComms);
        }

        Command::RequestSupport => {
            effects.push(Effect::Cue(AudioCue::Click));
            effects.push(Effect::log(
                LogSource::Hmi,
                "request_support",
                "Support request sent.",
            ));
        }

        Command::ToggleMute => effects.push(Effect::ToggleMute),
    }

    siren(prev, &state, &mut effects);
    if cmd.affects_alarms() {
        settle_alarms(&mut state, &mut effects);
    }

    Ok((state, effects))
}

/// Advance one second: auto-ramp, evacuation countdown, then alarms.
pub fn tick(prev: &SimulationState, cfg: &SimConfig) -> (SimulationState, Vec<Effect>) {
    let mut state = prev.clone();
    let mut effects = Vec::new();

    if state.ramp(&cfg.ramp) {
        effects.push(Effect::log(
            LogSource::AutoRamp,
            "gas_tick",
            format!(
                "o2={}% co={}ppm ch4={}%LEL",
                state.o2, state.co, state.ch4_lel
            ),
        ));
    }

    if safety::advance_evacuation(&mut state) == safety::EvacuationStep::Completed {
        effects.push(Effect::log(
            LogSource::System,
            "evacuazione_fine",
            "Timer at 0, controls locked.",
        ));
    }

    siren(prev, &state, &mut effects);
    settle_alarms(&mut state, &mut effects);

    (state, effects)
}

/// Start or stop the evacuation loop when the countdown becomes active or idle.
fn siren(prev: &SimulationState, next: &SimulationState, effects: &mut Vec<Effect>) {
    match (prev.evacuating(), next.evacuating()) {
        (false, true) => effects.push(Effect::Cue(AudioCue::EvacuationLoopStart)),
        (true, false) => effects.push(Effect::Cue(AudioCue::EvacuationLoopStop)),
        _ => {}
    }
}

/// Recompute alarms; announce the first newly raised one with a log entry and a cue.
fn settle_alarms(state: &mut SimulationState, effects: &mut Vec<Effect>) {
    let Some(alarm) = safety::recompute(state).raised else {
        return;
    };

    effects.push(Effect::log(
        LogSource::System,
        "allarme_generato",
        format!("{}: {}", alarm.severity, alarm.code),
    ));
    effects.push(Effect::Cue(match alarm.severity {
        Severity::Critical => AudioCue::Critical,
        Severity::Warn => AudioCue::Warning,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim::{AlarmCode, PlantStatus, SliderKey, ToggleKey};

    fn cfg() -> SimConfig {
        SimConfig::default()
    }

    fn logs(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Log { event, .. } => Some(event.as_str()),
                _ => None,
            })
            .collect()
    }

    fn cues(effects: &[Effect]) -> Vec<AudioCue> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Cue(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn running() -> SimulationState {
        SimulationState::scenario_3(cfg().thresholds)
    }

    #[test]
    fn prior_state_is_untouched() {
        let prev = running();
        let (next, _) = apply(
            &prev,
            &Command::SetSlider {
                key: SliderKey::Co,
                value: 50.0,
            },
            &cfg(),
        )
        .unwrap();
        assert_eq!(prev.co, 8.0);
        assert_eq!(next.co, 50.0);
    }

    #[test]
    fn every_state_change_logs_once() {
        let commands = [
            Command::StartScenario,
            Command::InjectFault {
                component: sim::Component::Lighting,
            },
            Command::ControlledShutdown {
                source: Source::Trainer,
            },
            Command::Toggle {
                key: ToggleKey::Loto,
            },
            Command::SetSlider {
                key: SliderKey::Pressure,
                value: 1.1,
            },
            Command::ClearAlarm {
                code: AlarmCode::CoHigh,
            },
            Command::SimulateCommsLoss,
            Command::RequestSupport,
        ];

        for cmd in commands {
            let (_, effects) = apply(&running(), &cmd, &cfg()).unwrap();
            assert_eq!(logs(&effects).len(), 1, "{cmd:?}");
        }
    }

    #[test]
    fn slider_crossing_threshold_raises_alarm() {
        let (state, effects) = apply(
            &running(),
            &Command::SetSlider {
                key: SliderKey::Ch4Lel,
                value: 1.5,
            },
            &cfg(),
        )
        .unwrap();

        assert_eq!(logs(&effects), ["set_ch4_lel", "allarme_generato"]);
        assert_eq!(cues(&effects), [AudioCue::Critical]);
        assert_eq!(state.active_alarms.len(), 1);
    }

    #[test]
    fn clear_alarm_waits_for_next_recompute() {
        let mut s = running();
        s.co = 45.0;
        safety::recompute(&mut s);

        let (cleared, effects) = apply(
            &s,
            &Command::ClearAlarm {
                code: AlarmCode::CoHigh,
            },
            &cfg(),
        )
        .unwrap();
        assert!(cleared.active_alarms.is_empty());
        assert_eq!(logs(&effects), ["clear_alarm"]);

        let (again, effects) = tick(&cleared, &cfg());
        assert_eq!(again.active_alarms.len(), 1);
        assert_eq!(logs(&effects), ["allarme_generato"]);
        assert_eq!(cues(&effects), [AudioCue::Warning]);
    }

    #[test]
    fn shutdown_arms_once_and_starts_siren() {
        let cmd = Command::ControlledShutdown {
            source: Source::Hmi,
        };
        let (armed, effects) = apply(&running(), &cmd, &cfg()).unwrap();
        assert_eq!(armed.evacuation_timer, 120);
        assert_eq!(armed.plant_status, PlantStatus::Running);
        assert_eq!(
            cues(&effects),
            [AudioCue::Click, AudioCue::EvacuationLoopStart]
        );

        let mut counting = armed.clone();
        counting.evacuation_timer = 40;
        let (same, effects) = apply(&counting, &cmd, &cfg()).unwrap();
        assert_eq!(same.evacuation_timer, 40);
        assert!(logs(&effects).is_empty());
    }

    #[test]
    fn reset_orders_clear_before_its_own_entry() {
        let mut s = running();
        s.evacuation_timer = 7;
        let (state, effects) = apply(&s, &Command::Reset, &cfg()).unwrap();

        assert_eq!(state, SimulationState::initial(cfg().thresholds));
        assert_eq!(
            effects,
            vec![
                Effect::ClearLog,
                Effect::CancelScheduled,
                Effect::Cue(AudioCue::EvacuationLoopStop),
                Effect::log(
                    LogSource::Trainer,
                    "reset_impianto",
                    "Simulation reset to initial state."
                ),
            ]
        );
    }

    #[test]
    fn rejected_slider_has_no_effects() {
        let cfg = SimConfig {
            slider_policy: crate::config::SliderPolicy::Reject,
            ..SimConfig::default()
        };
        let err = apply(
            &running(),
            &Command::SetSlider {
                key: SliderKey::O2,
                value: 30.0,
            },
            &cfg,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::OutOfRange { key: "o2", .. }));
    }

    #[test]
    fn tick_completes_evacuation_and_stops_siren() {
        let mut s = running();
        s.evacuation_timer = 1;
        let (next, effects) = tick(&s, &cfg());

        assert_eq!(next.plant_status, PlantStatus::Off);
        assert_eq!(logs(&effects), ["evacuazione_fine"]);
        assert_eq!(cues(&effects), [AudioCue::EvacuationLoopStop]);
        assert!(next.active_alarms.is_empty());
    }

    #[test]
    fn ramp_tick_summarises_all_three_readings() {
        let mut s = running();
        s.ventilation = ComponentStatus::Fault;
        s.auto_ramp_enabled = true;
        let (next, effects) = tick(&s, &cfg());

        assert_eq!(next.o2, 20.68);
        assert_eq!(
            effects[0],
            Effect::log(LogSource::AutoRamp, "gas_tick", "o2=20.68% co=9ppm ch4=0.32%LEL")
        );
    }
}
