//! The recovery ladder: a time-sorted sequence of recovery tiers and the
//! one-shot "fired" set that keeps each tier from firing twice in the same
//! failure episode (§4.C).

use nwwd_config::Config;
use nwwd_proto::ActionKind;
use std::collections::HashSet;
use std::time::Duration;

/// One tier of the ladder: a threshold and the action it triggers.
/// Equality is `(threshold, action)`, matching §3's definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LadderEntry {
    pub threshold: Duration,
    pub action: ActionKind,
}

/// A sorted sequence of [`LadderEntry`] plus the fired set for the current
/// episode.
#[derive(Debug, Clone)]
pub struct RecoveryLadder {
    entries: Vec<LadderEntry>,
    fired: HashSet<LadderEntry>,
}

impl RecoveryLadder {
    /// Builds the ladder from configuration (§4.C construction):
    /// seed the SOFT and HARD entries, fill the NETWORK tier's arithmetic
    /// progression up to the earlier of the two, then stable-sort by
    /// threshold so ties preserve insertion order.
    pub fn from_config(config: &Config) -> Self {
        let mut entries = vec![
            LadderEntry {
                threshold: Duration::from_secs(config.soft.reset_start),
                action: ActionKind::Soft,
            },
            LadderEntry {
                threshold: Duration::from_secs(config.hard.reset_start),
                action: ActionKind::Hard,
            },
        ];

        let last = config.soft.reset_start.min(config.hard.reset_start);

        if config.network_reset_interval > 0 {
            let mut t = config.network_reset_start;
            while t < last {
                entries.push(LadderEntry {
                    threshold: Duration::from_secs(t),
                    action: ActionKind::Network,
                });
                t += config.network_reset_interval;
            }
        } else if config.network_reset_start < last {
            entries.push(LadderEntry {
                threshold: Duration::from_secs(config.network_reset_start),
                action: ActionKind::Network,
            });
        }

        entries.sort_by_key(|e| e.threshold);

        Self {
            entries,
            fired: HashSet::new(),
        }
    }

    #[cfg(test)]
    fn from_entries(entries: Vec<LadderEntry>) -> Self {
        let mut entries = entries;
        entries.sort_by_key(|e| e.threshold);
        Self {
            entries,
            fired: HashSet::new(),
        }
    }

    /// The first entry, in ladder order, whose threshold is due and that
    /// has not already fired this episode. Only one action fires per tick
    /// (§4.C edge-case policy) — the Engine is responsible for invoking at
    /// most the single entry this returns.
    pub fn next_due(&self, elapsed: Duration) -> Option<LadderEntry> {
        self.entries
            .iter()
            .find(|e| e.threshold <= elapsed && !self.fired.contains(e))
            .copied()
    }

    pub fn mark_fired(&mut self, entry: LadderEntry) {
        debug_assert!(self.entries.contains(&entry), "entry must belong to the ladder");
        self.fired.insert(entry);
    }

    pub fn clear_fired(&mut self) {
        self.fired.clear();
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    pub fn entries(&self) -> &[LadderEntry] {
        &self.entries
    }
}
