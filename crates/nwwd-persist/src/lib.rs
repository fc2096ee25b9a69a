//! Persistent integer counter slots for the network watchdog daemon.
//!
//! A [`CounterStore`] reads and writes counter files: named, persistent,
//! non-negative integers stored as plain decimal ASCII on a single line of a
//! file. The format is an operator-facing contract and must stay bit-exact:
//! no JSON, no binary encoding.
//!
//! Counters must survive a soft reboot, since the "max resets before
//! escalating" decision depends on history that outlives a power cycle.
//! Corruption (an unreadable or unparseable file) is treated as zero — that
//! is strictly safer for availability than refusing to escalate.

#![forbid(unsafe_code)]

use std::path::Path;
use tracing::warn;

/// Reads and writes ASCII-integer counter files.
///
/// Stateless by design: every operation takes the counter's path explicitly,
/// since each recovery-ladder tier owns its own counter file rather than
/// sharing one domain the way `JsonStore` grouped keys under a single file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterStore;

impl CounterStore {
    pub fn new() -> Self {
        Self
    }

    /// Read the counter at `path`. Creates the parent directory and a
    /// zeroed file if nothing exists yet. Never fails to the caller — a
    /// corrupt or unreadable file reads back as `0`.
    pub fn read(&self, path: &Path) -> u64 {
        match std::fs::read_to_string(path) {
            Ok(contents) => match contents.trim().parse::<u64>() {
                Ok(n) => n,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt counter file, treating as zero");
                    0
                }
            },
            Err(_) => {
                self.create_zeroed(path);
                0
            }
        }
    }

    /// Set the counter at `path` to `n`, creating parent directories as
    /// needed. On failure, logs a warning and returns; the caller's
    /// in-memory view remains authoritative for this tick.
    pub fn write(&self, path: &Path, n: u64) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "failed to create counter directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(path, n.to_string()) {
            warn!(path = %path.display(), error = %e, "failed to write counter file");
        }
    }

    /// `write(path, read(path) + 1)`. Returns the new value.
    pub fn increment(&self, path: &Path) -> u64 {
        let n = self.read(path) + 1;
        self.write(path, n);
        n
    }

    /// Write `n` only if the stored value differs, avoiding a write on
    /// every healthy tick when the counter is already at rest.
    pub fn set_if_differs(&self, path: &Path, n: u64) {
        if self.read(path) != n {
            self.write(path, n);
        }
    }

    fn create_zeroed(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "failed to create counter directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(path, "0") {
            warn!(path = %path.display(), error = %e, "failed to create counter file");
        }
    }
}
