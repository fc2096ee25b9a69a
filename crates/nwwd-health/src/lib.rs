//! Health History, Recovery Ladder, Action Set, and Watchdog Engine — the
//! core of the network watchdog daemon (§4.B–§4.E). Infallible by
//! construction: [`WatchdogEngine::update`] never returns a `Result` (§7);
//! the recovery ladder is the error handler.

#![forbid(unsafe_code)]

mod actions;
mod engine;
mod history;
mod ladder;

pub use engine::{CounterPaths, EngineState, WatchdogEngine};
pub use history::HealthHistory;
pub use ladder::{LadderEntry, RecoveryLadder};
