//! The Watchdog Engine (§4.E): the tick loop's single mutator of health
//! history, the recovery ladder, and `last_connection_time`. This is the
//! direct generalization of `FailoverStateMachine::transition` to a
//! ratio/ladder model instead of a single health score.

use crate::actions::{self, ActionContext};
use crate::{HealthHistory, LadderEntry, RecoveryLadder};
use nwwd_config::Config;
use nwwd_persist::CounterStore;
use nwwd_platform::Platform;
use nwwd_proto::{ActionKind, MediaSlot};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coarse engine-level classification, derived purely from the current
/// health ratio each tick. Exposed for logging and operator inspection;
/// the dispatch logic in [`WatchdogEngine::update`] is driven directly by
/// the ratio thresholds, not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Healthy,
    Degraded,
    Recovering,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Recovering => write!(f, "recovering"),
        }
    }
}

/// The three counter files' resolved, absolute locations for this boot —
/// `sd_card_storage_loc` applied (or not) once at startup per the current
/// media slot.
#[derive(Debug, Clone)]
pub struct CounterPaths {
    pub network: PathBuf,
    pub soft: PathBuf,
    pub hard: PathBuf,
}

impl CounterPaths {
    pub fn resolve(config: &Config, current_media: MediaSlot) -> Self {
        Self {
            network: config.resolve_counter_path(&config.network_counter_file, current_media),
            soft: config.resolve_counter_path(&config.soft.counter_file, current_media),
            hard: config.resolve_counter_path(&config.hard.counter_file, current_media),
        }
    }
}

/// One Engine per process (§3). Owns the history, the ladder, the counter
/// paths, and the Platform it was built with.
pub struct WatchdogEngine<P: Platform> {
    config: Config,
    platform: P,
    counters: CounterStore,
    paths: CounterPaths,
    ladder: RecoveryLadder,
    history: HealthHistory,
    last_connection_time: Duration,
    state: EngineState,
}

impl<P: Platform> WatchdogEngine<P> {
    /// `last_connection_time = platform.now()`; history initialised to
    /// `N = max(1, floor(history_secs / period_secs))` all-false samples
    /// (§4.E Construction).
    pub fn new(config: Config, platform: P) -> Self {
        let current_media = platform.current_media();
        let paths = CounterPaths::resolve(&config, current_media);
        let history = HealthHistory::new(config.history_len());
        let ladder = RecoveryLadder::from_config(&config);
        let last_connection_time = platform.now();

        Self {
            config,
            platform,
            counters: CounterStore::new(),
            paths,
            ladder,
            history,
            last_connection_time,
            state: EngineState::Recovering,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn counter_paths(&self) -> &CounterPaths {
        &self.paths
    }

    /// Logs current media and all three counters, matching the scoreboard
    /// line the recovery actions emit before a reboot/poweroff (§11.1).
    /// `nwwd run` calls this once at startup.
    pub fn log_scoreboard(&self, reason: &str) {
        info!(
            reason,
            media = %self.platform.current_media(),
            network = self.counters.read(&self.paths.network),
            soft = self.counters.read(&self.paths.soft),
            hard = self.counters.read(&self.paths.hard),
            "scoreboard"
        );
    }

    /// One tick: probe, classify, and — in the recovering bucket — invoke
    /// at most one recovery-ladder entry. Infallible by construction; no
    /// error crosses out of this call (§7).
    pub fn update(&mut self) {
        let ok = self.platform.probe();
        let now = self.platform.now();
        let elapsed = now.saturating_sub(self.last_connection_time);

        self.history.add(ok);
        let ratio = self.history.ratio();

        if ratio >= self.config.healthy_ratio {
            self.set_state(EngineState::Healthy);
            self.on_pass(elapsed, now);
            return;
        }

        if ratio < self.config.recovery_ratio {
            self.set_state(EngineState::Recovering);
            self.on_fail(elapsed);
            self.fire_next_due(elapsed);
            return;
        }

        self.set_state(EngineState::Degraded);
        debug!(ratio, "in hysteresis band, holding state");
    }

    /// Healthy classification: reset the three counters (only if they
    /// differ from zero), advance the anchor, and clear the fired set.
    /// This is the only path that performs any of those three mutations
    /// (§8 invariant 3).
    fn on_pass(&mut self, elapsed: Duration, now: Duration) {
        self.counters.set_if_differs(&self.paths.network, 0);
        self.counters.set_if_differs(&self.paths.soft, 0);
        self.counters.set_if_differs(&self.paths.hard, 0);
        self.last_connection_time = now;

        if self.ladder.fired_count() > 0 {
            info!(
                elapsed = ?elapsed,
                cleared = self.ladder.fired_count(),
                "connectivity recovered, clearing recovery ladder state"
            );
        }
        self.ladder.clear_fired();
    }

    fn on_fail(&mut self, elapsed: Duration) {
        warn!(elapsed = ?elapsed, "health check failing");
    }

    /// At most one action per tick (§8 invariant 4): the earliest unfired
    /// due entry, if any.
    fn fire_next_due(&mut self, elapsed: Duration) {
        let Some(entry) = self.ladder.next_due(elapsed) else {
            return;
        };
        self.ladder.mark_fired(entry);
        self.invoke(entry);
    }

    fn invoke(&mut self, entry: LadderEntry) {
        let ctx = ActionContext {
            config: &self.config,
            counters: &self.counters,
            platform: &self.platform,
            paths: &self.paths,
        };
        match entry.action {
            ActionKind::Network => actions::run_network(&ctx),
            ActionKind::Soft => actions::run_soft(&ctx),
            ActionKind::Hard => actions::run_hard(&ctx),
        }
    }

    fn set_state(&mut self, new_state: EngineState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "engine state transition");
            self.state = new_state;
        }
    }
}
