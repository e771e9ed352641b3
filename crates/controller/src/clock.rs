use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::command::Command;
use crate::engine::Engine;
use crate::error::CommandError;
use crate::snapshot::{Role, Snapshot};

pub type SharedEngine = Arc<Mutex<Engine>>;

fn lock(engine: &SharedEngine) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-period ticker driving an engine. Late ticks are not caught up.
#[derive(Debug)]
pub struct Clock {
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl Clock {
    pub fn start(
        runtime: &Handle,
        engine: SharedEngine,
        period: Duration,
        updates: Arc<watch::Sender<Snapshot>>,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let mut engine = lock(&engine);
                // Checked under the lock: a reset cancels us while holding it.
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                engine.tick();
                // Published under the lock so feed order matches transition order.
                updates.send_replace(engine.snapshot(Role::Trainer));
            }
            debug!("clock stopped");
        });

        Self { task, cancelled }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A live training session: the shared engine, its clock, and a snapshot feed
/// refreshed after every tick and every command.
#[derive(Debug)]
pub struct Session {
    engine: SharedEngine,
    updates: Arc<watch::Sender<Snapshot>>,
    clock: Clock,
    runtime: Handle,
    period: Duration,
}

impl Session {
    /// Start ticking on the current tokio runtime.
    pub fn start(engine: Engine) -> Self {
        Self::start_on(&Handle::current(), engine)
    }

    pub fn start_on(runtime: &Handle, engine: Engine) -> Self {
        let period = engine.config().tick_period();
        let (updates, _) = watch::channel(engine.snapshot(Role::Trainer));
        let updates = Arc::new(updates);
        let engine = Arc::new(Mutex::new(engine));
        let clock = Clock::start(runtime, Arc::clone(&engine), period, Arc::clone(&updates));
        info!(period_ms = period.as_millis() as u64, "session started");

        Self {
            engine,
            updates,
            clock,
            runtime: runtime.clone(),
            period,
        }
    }

    /// Apply a command. A reset also restarts the clock so the first tick of the
    /// fresh session is a full period away.
    pub fn execute(&mut self, cmd: Command) -> Result<(), CommandError> {
        let reset = matches!(cmd, Command::Reset);
        let mut engine = lock(&self.engine);
        engine.execute(cmd)?;
        if reset {
            self.clock.cancel();
            self.clock = Clock::start(
                &self.runtime,
                Arc::clone(&self.engine),
                self.period,
                Arc::clone(&self.updates),
            );
            debug!("clock restarted after reset");
        }
        self.updates.send_replace(engine.snapshot(Role::Trainer));
        Ok(())
    }

    pub fn snapshot(&self, role: Role) -> Snapshot {
        lock(&self.engine).snapshot(role)
    }

    /// Trainer snapshots, published after every tick and command.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn is_ticking(&self) -> bool {
        self.clock.is_running()
    }

    pub fn stop(&self) {
        self.clock.cancel();
        info!("session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::config::SimConfig;
    use sim::{LogSource, PlantStatus};

    async fn advance(secs: u64) {
        for _ in 0..secs {
            tokio::time::advance(Duration::from_secs(1)).await;
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
    }

    fn session() -> Session {
        Session::start(Engine::new(SimConfig::default(), NullAudio))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let s = session();
        advance(3).await;
        assert_eq!(s.snapshot(Role::Trainer).tick, 3);
        assert!(s.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_after_commands_and_ticks() {
        let mut s = session();
        let mut rx = s.subscribe();

        s.execute(Command::StartScenario).unwrap();
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.state.plant_status, PlantStatus::Running);

        advance(1).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().tick, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn evacuation_completes_in_real_time() {
        let mut s = session();
        s.execute(Command::StartScenario).unwrap();
        s.execute(Command::ControlledShutdown {
            source: crate::command::Source::Trainer,
        })
        .unwrap();

        advance(120).await;
        let snap = s.snapshot(Role::Trainer);
        assert_eq!(snap.state.evacuation_timer, 0);
        assert_eq!(snap.state.plant_status, PlantStatus::Off);
        let done = snap
            .log
            .iter()
            .filter(|e| e.source == LogSource::System && e.event == "evacuazione_fine")
            .count();
        assert_eq!(done, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_clock_and_drops_stale_timers() {
        let mut s = session();
        s.execute(Command::SimulateCommsLoss).unwrap();
        advance(4).await;

        s.execute(Command::Reset).unwrap();
        advance(15).await;

        let snap = s.snapshot(Role::Hmi);
        assert_eq!(snap.tick, 19);
        assert_eq!(snap.log.len(), 1);
        assert_eq!(snap.log[0].event, "reset_impianto");
        assert!(s.is_ticking());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn feed_never_lags_behind_a_command() {
        let cfg = SimConfig {
            tick_ms: 1,
            ..SimConfig::default()
        };
        let mut s = Session::start(Engine::new(cfg, NullAudio));
        let rx = s.subscribe();

        let mut stale = 0;
        for i in 0..5_000u32 {
            let value = f64::from(i % 100);
            s.execute(Command::SetSlider {
                key: sim::SliderKey::Co,
                value,
            })
            .unwrap();
            // Ticks never move CO here, so every later snapshot must carry it.
            if rx.borrow().state.co != value {
                stale += 1;
            }
        }
        s.stop();
        assert_eq!(stale, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking() {
        let s = session();
        advance(2).await;
        s.stop();
        advance(5).await;
        assert_eq!(s.snapshot(Role::Trainer).tick, 2);
    }
}
