use confined_space_sim as css;

use css::{
    AlarmCode, Command, CommsStatus, Component, Engine, LogSource, PlantStatus, RecordingAudio,
    Role, Severity, SimConfig, SliderKey, Source, ToggleKey,
};
use proptest::prelude::*;

fn engine() -> Engine {
    Engine::new(SimConfig::default(), RecordingAudio::new())
}

fn set(e: &mut Engine, key: SliderKey, value: f64) {
    e.execute(Command::SetSlider { key, value }).unwrap();
}

#[test]
fn ventilation_fault_ramps_gases() {
    let mut e = engine();
    e.execute(Command::StartScenario).unwrap();

    // Bring the running plant back to a clean atmosphere before the fault.
    set(&mut e, SliderKey::O2, 20.9);
    set(&mut e, SliderKey::Co, 5.0);
    set(&mut e, SliderKey::Ch4Lel, 0.1);

    e.execute(Command::InjectFault {
        component: Component::Ventilation,
    })
    .unwrap();
    e.execute(Command::Toggle {
        key: ToggleKey::AutoRamp,
    })
    .unwrap();
    e.tick();

    let s = e.state();
    assert!((s.o2 - 20.88).abs() < 1e-9);
    assert_eq!(s.co, 6.0);
    assert!((s.ch4_lel - 0.12).abs() < 1e-9);

    let ramp_entries = e
        .log()
        .entries()
        .filter(|entry| entry.source == LogSource::AutoRamp)
        .count();
    assert_eq!(ramp_entries, 1);
    assert_eq!(
        e.log().latest().map(|entry| entry.detail.as_str()),
        Some("o2=20.88% co=6ppm ch4=0.12%LEL")
    );
}

#[test]
fn methane_above_threshold_is_critical() {
    let mut e = engine();
    e.execute(Command::StartScenario).unwrap();
    set(&mut e, SliderKey::ThrCh4LelHigh, 1.0);
    set(&mut e, SliderKey::Ch4Lel, 1.5);

    let alarms = &e.state().active_alarms;
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].code, AlarmCode::GasHigh);
    assert_eq!(alarms[0].severity, Severity::Critical);
    assert_eq!(e.log().count(LogSource::System, "allarme_generato"), 1);
    assert_eq!(e.snapshot(Role::Trainer).banner, css::AlarmBanner::Critical);
}

#[test]
fn controlled_shutdown_evacuates_in_120_ticks() {
    let mut e = engine();
    e.execute(Command::StartScenario).unwrap();
    e.execute(Command::ControlledShutdown {
        source: Source::Trainer,
    })
    .unwrap();
    assert_eq!(e.state().evacuation_timer, 120);

    let mut last = e.state().evacuation_timer;
    for _ in 0..120 {
        e.tick();
        assert_eq!(e.state().evacuation_timer, last - 1);
        last = e.state().evacuation_timer;
    }

    assert_eq!(e.state().evacuation_timer, 0);
    assert_eq!(e.state().plant_status, PlantStatus::Off);
    assert_eq!(e.log().count(LogSource::System, "evacuazione_fine"), 1);

    for _ in 0..5 {
        e.tick();
    }
    assert_eq!(e.log().count(LogSource::System, "evacuazione_fine"), 1);
}

#[test]
fn comms_loss_only_reaches_the_hmi() {
    let mut e = engine();
    e.execute(Command::StartScenario).unwrap();
    e.execute(Command::SimulateCommsLoss).unwrap();

    for _ in 0..9 {
        e.tick();
        assert_eq!(e.observe(Role::Hmi).comms_status, CommsStatus::Lost);
        assert_eq!(e.observe(Role::Trainer).comms_status, CommsStatus::Normal);
    }

    e.tick();
    assert_eq!(e.observe(Role::Hmi).comms_status, CommsStatus::Normal);
    assert_eq!(e.state().comms_status, CommsStatus::Normal);
    assert_eq!(e.log().count(LogSource::System, "comms_restored"), 1);
}

#[test]
fn reset_twice_is_idempotent() {
    let mut e = engine();
    e.execute(Command::StartScenario).unwrap();
    set(&mut e, SliderKey::Co, 80.0);
    e.execute(Command::ControlledShutdown {
        source: Source::Hmi,
    })
    .unwrap();
    e.execute(Command::SimulateCommsLoss).unwrap();
    e.tick();

    e.execute(Command::Reset).unwrap();
    let once = e.state().clone();
    e.execute(Command::Reset).unwrap();

    assert_eq!(e.state(), &once);
    assert!(!e.comms_frozen());
    let events: Vec<_> = e.log().entries().map(|entry| entry.event.clone()).collect();
    assert_eq!(events, ["reset_impianto"]);
}

#[test]
fn ramp_freezes_when_any_gate_closes() {
    let gates: [fn(&mut Engine); 3] = [
        |e| {
            e.execute(Command::Toggle {
                key: ToggleKey::AutoRamp,
            })
            .unwrap()
        },
        |e| {
            e.execute(Command::ControlledShutdown {
                source: Source::Trainer,
            })
            .unwrap();
            for _ in 0..120 {
                e.tick();
            }
        },
        |e| e.execute(Command::Reset).unwrap(),
    ];

    for close in gates {
        let mut e = engine();
        e.execute(Command::StartScenario).unwrap();
        e.execute(Command::InjectFault {
            component: Component::Ventilation,
        })
        .unwrap();
        e.execute(Command::Toggle {
            key: ToggleKey::AutoRamp,
        })
        .unwrap();

        close(&mut e);
        let frozen = e.state().clone();
        e.tick();
        assert_eq!(e.state().o2, frozen.o2);
        assert_eq!(e.state().co, frozen.co);
        assert_eq!(e.state().ch4_lel, frozen.ch4_lel);
    }
}

#[derive(Clone, Debug)]
enum Step {
    Cmd(Command),
    Tick(u8),
}

fn command() -> impl Strategy<Value = Command> {
    let source = prop_oneof![Just(Source::Trainer), Just(Source::Hmi)];
    prop_oneof![
        Just(Command::StartScenario),
        prop::sample::select(Component::ALL.to_vec())
            .prop_map(|component| Command::InjectFault { component }),
        source.prop_map(|source| Command::ControlledShutdown { source }),
        Just(Command::Reset),
        prop::sample::select(ToggleKey::ALL.to_vec()).prop_map(|key| Command::Toggle { key }),
        (prop::sample::select(SliderKey::ALL.to_vec()), 0.0f64..120.0)
            .prop_map(|(key, value)| Command::SetSlider { key, value }),
        prop::sample::select(AlarmCode::ALL.to_vec()).prop_map(|code| Command::ClearAlarm { code }),
        Just(Command::SimulateCommsLoss),
        Just(Command::RequestSupport),
        Just(Command::ToggleMute),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => command().prop_map(Step::Cmd),
        2 => (1u8..15).prop_map(Step::Tick),
    ]
}

proptest! {
    #[test]
    fn random_sessions_keep_alarms_log_and_overlay_consistent(
        steps in prop::collection::vec(step(), 1..80),
    ) {
        let mut e = engine();

        for step in steps {
            match step {
                Step::Cmd(cmd) => {
                    // The default slider policy accepts every finite value.
                    e.execute(cmd).unwrap();
                }
                Step::Tick(n) => {
                    for _ in 0..n {
                        e.tick();

                        let s = e.state();
                        prop_assert_eq!(&s.active_alarms, &css::evaluate(s));

                        let ticks: Vec<u64> = e.log().entries().map(|entry| entry.tick).collect();
                        prop_assert!(ticks.windows(2).all(|w| w[0] >= w[1]), "{:?}", ticks);

                        let hmi = e.observe(Role::Hmi).comms_status;
                        prop_assert_eq!(hmi == CommsStatus::Lost, e.comms_frozen());
                        prop_assert_eq!(e.observe(Role::Trainer).comms_status, CommsStatus::Normal);
                    }
                }
            }
        }
    }
}
