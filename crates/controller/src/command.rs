use serde::{Deserialize, Serialize};
use sim::{AlarmCode, Component, LogSource, SliderKey, ToggleKey};

use crate::error::CommandError;

/// Which console issued a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Trainer,
    Hmi,
}

impl From<Source> for LogSource {
    fn from(s: Source) -> Self {
        match s {
            Source::Trainer => LogSource::Trainer,
            Source::Hmi => LogSource::Hmi,
        }
    }
}

/// Operator intents accepted by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartScenario,
    InjectFault { component: Component },
    ControlledShutdown { source: Source },
    Reset,
    Toggle { key: ToggleKey },
    SetSlider { key: SliderKey, value: f64 },
    ClearAlarm { code: AlarmCode },
    SimulateCommsLoss,
    RequestSupport,
    ToggleMute,
}

impl Command {
    /// Whether the command can change readings, thresholds or plant status,
    /// and so must be followed by an alarm recomputation.
    pub fn affects_alarms(&self) -> bool {
        matches!(
            self,
            Command::StartScenario | Command::Reset | Command::SetSlider { .. }
        )
    }

    /// Parse one script command, e.g. `set ch4-lel 1.5` or `inject-fault ventilation`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let mut arg = |command: &'static str, expected: &'static str| {
            words
                .next()
                .ok_or(CommandError::MissingArgument { command, expected })
        };

        let cmd = match verb {
            "start-scenario" => Command::StartScenario,
            "inject-fault" => Command::InjectFault {
                component: parse_component(arg("inject-fault", "a component")?)?,
            },
            "shutdown" => Command::ControlledShutdown {
                source: parse_source(arg("shutdown", "a source (trainer|hmi)")?)?,
            },
            "reset" => Command::Reset,
            "toggle" => Command::Toggle {
                key: parse_toggle(arg("toggle", "a toggle key")?)?,
            },
            "set" => {
                let key = parse_slider(arg("set", "a slider key and a value")?)?;
                let raw = arg("set", "a slider key and a value")?;
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| CommandError::InvalidNumber(raw.to_string()))?;
                Command::SetSlider { key, value }
            }
            "clear-alarm" => Command::ClearAlarm {
                code: parse_alarm(arg("clear-alarm", "an alarm code")?)?,
            },
            "comms-loss" => Command::SimulateCommsLoss,
            "request-support" => Command::RequestSupport,
            "mute" => Command::ToggleMute,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };

        Ok(cmd)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('-', "_")
}

pub fn parse_component(s: &str) -> Result<Component, CommandError> {
    let n = normalize(s);
    Component::ALL
        .into_iter()
        .find(|c| c.as_str() == n)
        .ok_or_else(|| CommandError::UnknownComponent(s.to_string()))
}

pub fn parse_toggle(s: &str) -> Result<ToggleKey, CommandError> {
    let n = normalize(s);
    ToggleKey::ALL
        .into_iter()
        .find(|k| k.as_str() == n)
        .ok_or_else(|| CommandError::UnknownToggle(s.to_string()))
}

pub fn parse_slider(s: &str) -> Result<SliderKey, CommandError> {
    let n = normalize(s);
    SliderKey::ALL
        .into_iter()
        .find(|k| k.as_str() == n)
        .ok_or_else(|| CommandError::UnknownSlider(s.to_string()))
}

pub fn parse_alarm(s: &str) -> Result<AlarmCode, CommandError> {
    AlarmCode::from_code(&s.trim().to_ascii_uppercase())
        .ok_or_else(|| CommandError::UnknownAlarm(s.to_string()))
}

pub fn parse_source(s: &str) -> Result<Source, CommandError> {
    match normalize(s).as_str() {
        "trainer" => Ok(Source::Trainer),
        "hmi" => Ok(Source::Hmi),
        _ => Err(CommandError::UnknownSource(s.to_string())),
    }
}

/// A command from a script, optionally pinned to a session tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptLine {
    /// Run once the session has completed this many ticks; `None` means immediately.
    pub at_tick: Option<u64>,
    pub command: Command,
}

/// Parse a script: one command per line, `#` comments, optional `@<tick>` prefix.
///
/// Returns the commands that parsed and, separately, the 1-based line numbers
/// that did not together with their errors.
pub fn parse_script(text: &str) -> (Vec<ScriptLine>, Vec<(usize, CommandError)>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        match parse_script_line(line) {
            Ok(l) => lines.push(l),
            Err(e) => errors.push((i + 1, e)),
        }
    }

    (lines, errors)
}

fn parse_script_line(line: &str) -> Result<ScriptLine, CommandError> {
    let Some(rest) = line.strip_prefix('@') else {
        return Ok(ScriptLine {
            at_tick: None,
            command: Command::parse(line)?,
        });
    };

    let (tick, cmd) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| CommandError::InvalidTick(line.to_string()))?;
    let at_tick = tick
        .parse::<u64>()
        .map_err(|_| CommandError::InvalidTick(tick.to_string()))?;

    Ok(ScriptLine {
        at_tick: Some(at_tick),
        command: Command::parse(cmd)?,
    })
}
