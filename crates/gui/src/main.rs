use std::time::Duration;

use controller::{Command, Controls, Engine, Role, Session, SimConfig, Snapshot, Source, TracingAudio};
use eframe::egui::{self, Color32, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use safety::{AlarmBanner, EvacuationPhase};
use sim::{
    AlarmCode, CommsStatus, Component, ComponentStatus, LogEntry, PlantStatus, Severity,
    SimulationState, SliderKey, ToggleKey,
};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ticks of gas history kept for the trend plots.
const HISTORY: usize = 600;

#[derive(Clone, Copy, Debug)]
struct GasSample {
    tick: u64,
    o2: f64,
    co: f64,
    ch4_lel: f64,
}

struct App {
    session: Session,
    updates: watch::Receiver<Snapshot>,
    samples: Vec<GasSample>,
    last_error: Option<String>,
    // Declared last so the session's clock is dropped first.
    _runtime: Runtime,
}

impl App {
    fn new(config: SimConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()?;
        let session = Session::start_on(runtime.handle(), Engine::new(config, TracingAudio));
        let updates = session.subscribe();

        Ok(Self {
            session,
            updates,
            samples: Vec::new(),
            last_error: None,
            _runtime: runtime,
        })
    }

    fn send(&mut self, cmd: Command) {
        if matches!(cmd, Command::Reset) {
            self.samples.clear();
        }
        match self.session.execute(cmd) {
            Ok(()) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn record(&mut self, tick: u64, s: &SimulationState) {
        if self.samples.last().is_some_and(|last| last.tick >= tick) {
            return;
        }
        self.samples.push(GasSample {
            tick,
            o2: s.o2,
            co: s.co,
            ch4_lel: s.ch4_lel,
        });
        if self.samples.len() > HISTORY {
            let excess = self.samples.len() - HISTORY;
            self.samples.drain(..excess);
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let trainer = self.updates.borrow_and_update().clone();
        let hmi = self.session.snapshot(Role::Hmi);
        self.record(trainer.tick, &trainer.state);

        let mut out: Vec<Command> = Vec::new();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Confined Space Trainer");
                ui.separator();
                ui.label(format!("tick {}", trainer.tick));
                ui.separator();
                ui.label(plant_text(trainer.state.plant_status));
                ui.separator();

                let mute = if trainer.muted { "Unmute audio" } else { "Mute audio" };
                if ui.button(mute).clicked() {
                    out.push(Command::ToggleMute);
                }

                if let Some(err) = &self.last_error {
                    ui.separator();
                    ui.colored_label(Color32::RED, err.as_str());
                }
            });
        });

        egui::TopBottomPanel::bottom("log")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                ui.label(format!("Event log ({} entries)", trainer.log.len()));
                log_panel(ui, &trainer.log);
            });

        egui::SidePanel::left("trainer")
            .resizable(false)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| trainer_panel(ui, &trainer, &mut out));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            hmi_panel(ui, &hmi, &mut out);
            ui.separator();
            gas_plots(ui, &self.samples, &trainer.state);
        });

        for cmd in out {
            self.send(cmd);
        }

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn trainer_panel(ui: &mut egui::Ui, snap: &Snapshot, out: &mut Vec<Command>) {
    let s = &snap.state;
    let c: Controls = snap.controls;

    ui.heading("Trainer");
    ui.horizontal(|ui| {
        if ui
            .add_enabled(c.start_scenario, egui::Button::new("Start scenario 3"))
            .clicked()
        {
            out.push(Command::StartScenario);
        }
        if ui.add_enabled(c.reset, egui::Button::new("Reset")).clicked() {
            out.push(Command::Reset);
        }
    });
    if ui
        .add_enabled(c.shutdown, egui::Button::new("Controlled shutdown"))
        .clicked()
    {
        out.push(Command::ControlledShutdown {
            source: Source::Trainer,
        });
    }
    if let Some(left) = evacuation_countdown(s) {
        ui.colored_label(Color32::RED, format!("Evacuation: {left}"));
    }

    ui.separator();
    ui.label("Inject fault");
    ui.horizontal(|ui| {
        for component in Component::ALL {
            let faulted = s.component(component) == ComponentStatus::Fault;
            if ui
                .add_enabled(
                    c.inject_fault && !faulted,
                    egui::Button::new(component.as_str()),
                )
                .clicked()
            {
                out.push(Command::InjectFault { component });
            }
        }
    });

    ui.separator();
    ui.label("Switches");
    for key in ToggleKey::ALL {
        let mut on = s.toggle(key);
        if ui.checkbox(&mut on, key.as_str()).changed() {
            out.push(Command::Toggle { key });
        }
    }
    if ui.button("Simulate comms loss").clicked() {
        out.push(Command::SimulateCommsLoss);
    }

    ui.separator();
    ui.label("Readings and thresholds");
    for key in SliderKey::ALL {
        let (min, max) = key.range();
        let mut value = s.slider(key);
        // widen so an out-of-range value is shown, not clamped
        let range = min.min(value)..=max.max(value);
        let slider = egui::Slider::new(&mut value, range)
            .step_by(key.step())
            .text(key.as_str());
        if ui.add(slider).changed() {
            out.push(Command::SetSlider { key, value });
        }
    }

    ui.separator();
    ui.label("Active alarms");
    if s.active_alarms.is_empty() {
        ui.small("none");
    }
    for alarm in &s.active_alarms {
        ui.horizontal(|ui| {
            ui.colored_label(
                severity_color(alarm.severity),
                format!("{} {}", alarm.severity, alarm.code),
            );
            if ui.small_button("Clear").clicked() {
                out.push(Command::ClearAlarm { code: alarm.code });
            }
        });
    }
}

fn hmi_panel(ui: &mut egui::Ui, snap: &Snapshot, out: &mut Vec<Command>) {
    let s = &snap.state;
    let t = &s.thresholds;

    ui.heading("Operator HMI");
    ui.horizontal(|ui| {
        let (text, color) = match s.comms_status {
            CommsStatus::Normal => ("COMMS OK", Color32::GREEN),
            CommsStatus::Degraded => ("COMMS DEGRADED", Color32::YELLOW),
            CommsStatus::Lost => ("COMMS LOST", Color32::RED),
        };
        ui.colored_label(color, text);
        ui.separator();
        ui.label(RichText::new(plant_text(s.plant_status)).strong());
    });

    let (banner, color) = match snap.banner {
        AlarmBanner::None => ("No active alarms", Color32::GREEN),
        AlarmBanner::Warn => ("WARNING", Color32::YELLOW),
        AlarmBanner::Critical => ("CRITICAL ALARM", Color32::RED),
    };
    ui.label(RichText::new(banner).color(color).heading());

    if let Some(left) = evacuation_countdown(s) {
        ui.label(
            RichText::new(format!("EVACUATE  {left}"))
                .color(Color32::RED)
                .heading(),
        );
    }

    ui.columns(2, |cols| {
        egui::Grid::new("subsystems").show(&mut cols[0], |ui| {
            for component in Component::ALL {
                let status = s.component(component);
                ui.label(component.as_str());
                ui.colored_label(status_color(status), status_text(status));
                ui.end_row();
            }
            ui.label("e-stop");
            ui.label(if s.e_stop { "ENGAGED" } else { "-" });
            ui.end_row();
            ui.label("LOTO");
            ui.label(if s.loto { "APPLIED" } else { "-" });
            ui.end_row();
        });

        egui::Grid::new("readings").show(&mut cols[1], |ui| {
            reading(ui, "O2", format!("{:.2} %", s.o2), (s.o2 < t.o2_low).then_some(AlarmCode::O2Low));
            reading(ui, "CO", format!("{:.0} ppm", s.co), (s.co > t.co_high).then_some(AlarmCode::CoHigh));
            reading(
                ui,
                "CH4",
                format!("{:.2} %LEL", s.ch4_lel),
                (s.ch4_lel > t.ch4_lel_high).then_some(AlarmCode::GasHigh),
            );
            reading(ui, "Pressure", format!("{:.2} bar", s.pressure), None);
            reading(ui, "Temperature", format!("{:.1} °C", s.temperature), None);
        });
    });

    ui.horizontal(|ui| {
        if ui
            .add_enabled(snap.controls.shutdown, egui::Button::new("Controlled shutdown"))
            .clicked()
        {
            out.push(Command::ControlledShutdown { source: Source::Hmi });
        }
        if ui
            .add_enabled(snap.controls.request_support, egui::Button::new("Request support"))
            .clicked()
        {
            out.push(Command::RequestSupport);
        }
    });
}

fn reading(ui: &mut egui::Ui, name: &str, value: String, over: Option<AlarmCode>) {
    ui.label(name);
    match over {
        Some(code) => ui.colored_label(severity_color(code.severity()), value),
        None => ui.label(value),
    };
    ui.end_row();
}

fn log_panel(ui: &mut egui::Ui, log: &[LogEntry]) {
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            egui::Grid::new("log_grid").striped(true).show(ui, |ui| {
                for entry in log {
                    ui.monospace(format!("{:>5}", entry.tick));
                    ui.monospace(entry.timestamp.format("%H:%M:%S").to_string());
                    ui.label(entry.source.as_str());
                    ui.label(entry.event.as_str());
                    ui.label(entry.detail.as_str());
                    ui.end_row();
                }
            });
        });
}

fn gas_plots(ui: &mut egui::Ui, samples: &[GasSample], s: &SimulationState) {
    if samples.is_empty() {
        ui.label("No data yet.");
        return;
    }

    let series = |f: fn(&GasSample) -> f64| -> PlotPoints {
        samples.iter().map(|g| [g.tick as f64, f(g)]).collect()
    };
    let t0 = samples.first().map_or(0.0, |g| g.tick as f64);
    let t1 = samples.last().map_or(0.0, |g| g.tick as f64);

    ui.heading("Trends");
    Plot::new("o2_plot")
        .height(160.0)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(series(|g| g.o2)).name("O2 (%)"));
            let low: PlotPoints = vec![[t0, s.thresholds.o2_low], [t1, s.thresholds.o2_low]].into();
            plot_ui.line(Line::new(low).name("O2 low"));
        });

    Plot::new("toxic_plot")
        .height(160.0)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(series(|g| g.co)).name("CO (ppm)"));
            plot_ui.line(Line::new(series(|g| g.ch4_lel)).name("CH4 (%LEL)"));
        });
}

/// `mm:ss` left while an evacuation is counting down.
fn evacuation_countdown(s: &SimulationState) -> Option<String> {
    match safety::phase(s) {
        EvacuationPhase::Counting { remaining } => {
            Some(format!("{:02}:{:02}", remaining / 60, remaining % 60))
        }
        EvacuationPhase::Idle => None,
    }
}

fn plant_text(p: PlantStatus) -> &'static str {
    match p {
        PlantStatus::Off => "PLANT OFF",
        PlantStatus::Ready => "PLANT READY",
        PlantStatus::Running => "PLANT RUNNING",
    }
}

fn status_text(c: ComponentStatus) -> &'static str {
    match c {
        ComponentStatus::On => "ON",
        ComponentStatus::Off => "OFF",
        ComponentStatus::Fault => "FAULT",
    }
}

fn status_color(c: ComponentStatus) -> Color32 {
    match c {
        ComponentStatus::On => Color32::GREEN,
        ComponentStatus::Off => Color32::GRAY,
        ComponentStatus::Fault => Color32::RED,
    }
}

fn severity_color(s: Severity) -> Color32 {
    match s {
        Severity::Warn => Color32::YELLOW,
        Severity::Critical => Color32::RED,
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // optional TOML config path
    let config_path = std::env::args().nth(1);

    eframe::run_native(
        "Confined Space Trainer",
        eframe::NativeOptions::default(),
        Box::new(move |_cc| {
            let config = match &config_path {
                Some(path) => SimConfig::load(path)?,
                None => SimConfig::default(),
            };
            info!(?config, "starting trainer console");
            Ok(Box::new(App::new(config)?))
        }),
    )
}
