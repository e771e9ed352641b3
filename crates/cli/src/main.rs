use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use controller::{
    parse_script, Command, Engine, Role, ScriptLine, Session, SharedEngine, SimConfig,
    SliderPolicy, TracingAudio,
};
use safety::AlarmBanner;
use sim::{LogEntry, SimulationState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Plant off, nothing scheduled
    Idle,
    VentilationFault,
    GasLeak,
    Evacuation,
    CommsLoss,
}

impl Scenario {
    fn script(self) -> &'static str {
        match self {
            Scenario::Idle => "",
            Scenario::VentilationFault => {
                "start-scenario
                 @5 inject-fault ventilation
                 @5 toggle auto-ramp"
            }
            Scenario::GasLeak => {
                "start-scenario
                 @3 set ch4-lel 1.5
                 @10 shutdown hmi"
            }
            Scenario::Evacuation => {
                "start-scenario
                 @2 shutdown trainer
                 @60 mute
                 @70 mute"
            }
            Scenario::CommsLoss => {
                "start-scenario
                 @2 comms-loss
                 @4 inject-fault gas-analysis
                 @6 comms-loss
                 @8 request-support"
            }
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Passthrough,
    Clamp,
    Reject,
}

impl From<PolicyArg> for SliderPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Passthrough => SliderPolicy::Passthrough,
            PolicyArg::Clamp => SliderPolicy::Clamp,
            PolicyArg::Reject => SliderPolicy::Reject,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Trainer,
    Hmi,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Trainer => Role::Trainer,
            RoleArg::Hmi => Role::Hmi,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "confined-space-sim",
    version,
    about = "Confined-space plant training simulator"
)]
struct Cli {
    /// Debug-level diagnostics on stderr (RUST_LOG still applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario and print one JSON trace row per tick
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Controlled-shutdown countdown length (s)
    #[arg(long)]
    evacuation_seconds: Option<u32>,

    /// What to do with slider values outside their range
    #[arg(long, value_enum)]
    slider_policy: Option<PolicyArg>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<SimConfig> {
        let mut cfg = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(secs) = self.evacuation_seconds {
            cfg.evacuation_seconds = secs;
        }
        if let Some(policy) = self.slider_policy {
            cfg.slider_policy = policy.into();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(value_enum, long, default_value = "ventilation-fault")]
    scenario: Scenario,

    /// Extra commands, one per line, optionally prefixed with `@<tick>`
    #[arg(long)]
    script: Option<PathBuf>,

    /// Ticks to simulate (one tick is one simulated second)
    #[arg(long, default_value_t = 150)]
    seconds: u64,

    /// Tick on the wall clock instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Whose view of the plant is traced
    #[arg(value_enum, long, default_value = "trainer")]
    role: RoleArg,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceRow {
    tick: u64,
    role: Role,
    state: SimulationState,
    emergency: bool,
    critical_alarm: bool,
    banner: AlarmBanner,
    comms_frozen: bool,
    muted: bool,
    /// Log entries appended since the previous row, oldest first.
    events: Vec<LogEntry>,
}

/// Script commands ordered by the tick they wait for.
#[derive(Debug, Default)]
struct Plan {
    steps: Vec<(u64, Command)>,
    next: usize,
}

impl Plan {
    /// A line without `@<tick>` runs with the line before it.
    fn add(&mut self, lines: Vec<ScriptLine>) {
        let mut at = 0;
        for line in lines {
            at = line.at_tick.unwrap_or(at);
            self.steps.push((at, line.command));
        }
        self.steps.sort_by_key(|(tick, _)| *tick);
    }

    /// Commands to run once `tick` ticks have completed.
    fn due(&mut self, tick: u64) -> Vec<Command> {
        let mut out = Vec::new();
        while let Some((at, cmd)) = self.steps.get(self.next) {
            if *at > tick {
                break;
            }
            out.push(cmd.clone());
            self.next += 1;
        }
        out
    }

    fn len(&self) -> usize {
        self.steps.len()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Config(args) => {
            print!("{}", args.resolve()?.to_toml()?);
            Ok(())
        }
    }
}

/// Filter used when `RUST_LOG` is unset or invalid.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_tracing(verbose: bool) {
    // stdout carries the trace
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .init();
}

async fn run(args: RunArgs) -> Result<()> {
    let cfg = args.config.resolve()?;

    let mut plan = Plan::default();
    plan.add(parse_logged(args.scenario.script(), "scenario"));
    if let Some(path) = &args.script {
        plan.add(load_script(path)?);
    }

    info!(
        scenario = ?args.scenario,
        seconds = args.seconds,
        commands = plan.len(),
        realtime = args.realtime,
        "starting run"
    );

    let engine = Engine::new(cfg, TracingAudio);
    let role = args.role.into();
    if args.realtime {
        run_realtime(engine, plan, args.seconds, role).await
    } else {
        run_fast(engine, plan, args.seconds, role)
    }
}

fn load_script(path: &Path) -> Result<Vec<ScriptLine>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    Ok(parse_logged(&text, &path.display().to_string()))
}

/// Parse a script, skipping bad lines with a warning.
fn parse_logged(text: &str, origin: &str) -> Vec<ScriptLine> {
    let (lines, errors) = parse_script(text);
    for (line, e) in errors {
        warn!(origin, line, error = %e, "skipping script line");
    }
    lines
}

fn run_fast(mut engine: Engine, mut plan: Plan, seconds: u64, role: Role) -> Result<()> {
    let mut mark = 0;

    for _ in 0..seconds {
        for cmd in plan.due(engine.tick_count()) {
            // the engine logs rejections itself
            let _ = engine.execute(cmd);
        }
        engine.tick();

        let row = trace_row(&engine, role, &mut mark);
        println!("{}", serde_json::to_string(&row)?);
    }

    summary(&engine);
    Ok(())
}

async fn run_realtime(engine: Engine, mut plan: Plan, seconds: u64, role: Role) -> Result<()> {
    let mut session = Session::start(engine);
    let shared = session.engine();
    let mut updates = session.subscribe();
    let mut mark = 0;
    let mut last = 0;

    for cmd in plan.due(0) {
        let _ = session.execute(cmd);
    }

    while last < seconds {
        updates.changed().await.context("session clock stopped")?;
        // commands publish too; only ticks produce rows
        let Some(row) = fresh_row(&shared, role, last, &mut mark) else {
            continue;
        };
        last = row.tick;
        println!("{}", serde_json::to_string(&row)?);

        for cmd in plan.due(last) {
            let _ = session.execute(cmd);
        }
    }

    session.stop();
    summary(&shared.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(())
}

/// Trace the engine if it has ticked past `last`. The row and its tick come from
/// one lock, so a tick landing after the feed was read is still counted once.
fn fresh_row(shared: &SharedEngine, role: Role, last: u64, mark: &mut u64) -> Option<TraceRow> {
    let engine = shared.lock().unwrap_or_else(PoisonError::into_inner);
    (engine.tick_count() != last).then(|| trace_row(&engine, role, mark))
}

fn trace_row(engine: &Engine, role: Role, mark: &mut u64) -> TraceRow {
    let mut events: Vec<LogEntry> = engine.log().since(*mark).cloned().collect();
    events.reverse();
    *mark = engine.log().appended();

    let snap = engine.snapshot(role);
    TraceRow {
        tick: snap.tick,
        role: snap.role,
        state: snap.state,
        emergency: snap.emergency,
        critical_alarm: snap.critical_alarm,
        banner: snap.banner,
        comms_frozen: engine.comms_frozen(),
        muted: snap.muted,
        events,
    }
}

fn summary(engine: &Engine) {
    let s = engine.state();
    info!(
        ticks = engine.tick_count(),
        plant = ?s.plant_status,
        alarms = s.active_alarms.len(),
        log_entries = engine.log().len(),
        "run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn builtin_scripts_parse_cleanly() {
        for scenario in Scenario::value_variants() {
            let (_, errors) = parse_script(scenario.script());
            assert!(errors.is_empty(), "{scenario:?}: {errors:?}");
        }
    }

    #[test]
    fn plan_orders_by_tick_and_inherits_markers() {
        let mut plan = Plan::default();
        plan.add(parse_logged("@4 reset\nstart-scenario\n@1 comms-loss", "test"));

        assert!(plan.due(0).is_empty());
        assert_eq!(plan.due(1), vec![Command::SimulateCommsLoss]);
        assert_eq!(plan.due(9), vec![Command::Reset, Command::StartScenario]);
        assert!(plan.due(10).is_empty());
    }

    #[test]
    fn fast_run_traces_rows_and_events() {
        let mut engine = Engine::new(SimConfig::default(), controller::NullAudio);
        let mut plan = Plan::default();
        plan.add(parse_logged(Scenario::GasLeak.script(), "test"));

        let mut mark = 0;
        let mut rows = Vec::new();
        for _ in 0..5 {
            for cmd in plan.due(engine.tick_count()) {
                engine.execute(cmd).unwrap();
            }
            engine.tick();
            rows.push(trace_row(&engine, Role::Hmi, &mut mark));
        }

        assert_eq!(rows[0].events[0].event, "start_scenario_3");
        let raised: Vec<_> = rows[3].events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(raised, ["set_ch4_lel", "allarme_generato"]);
        assert_eq!(rows[3].banner, AlarmBanner::Critical);
        assert!(rows[4].events.is_empty());
    }

    #[test]
    fn rows_take_their_tick_from_the_engine() {
        let shared: SharedEngine = Arc::new(Mutex::new(Engine::new(
            SimConfig::default(),
            controller::NullAudio,
        )));
        let mut mark = 0;
        assert!(fresh_row(&shared, Role::Trainer, 0, &mut mark).is_none());

        shared.lock().unwrap().execute(Command::StartScenario).unwrap();
        assert!(fresh_row(&shared, Role::Trainer, 0, &mut mark).is_none());
        assert_eq!(mark, 0);

        // Two ticks land before the reader wakes up.
        shared.lock().unwrap().tick();
        shared.lock().unwrap().tick();
        let row = fresh_row(&shared, Role::Trainer, 0, &mut mark).unwrap();
        assert_eq!(row.tick, 2);
        assert_eq!(row.events[0].event, "start_scenario_3");
        assert!(fresh_row(&shared, Role::Trainer, row.tick, &mut mark).is_none());
    }

    #[test]
    fn verbose_only_sets_the_fallback_filter() {
        assert_eq!(default_filter(false), "info");
        assert_eq!(default_filter(true), "debug");
    }
}
