//! Shared domain types for the network watchdog daemon.
//!
//! Small, dependency-free value types reused across the `nwwd-*` crates:
//! the bootable media slot, the recovery tier identifiers, and the uplink
//! target a probe checks. No logic lives here — just the types the other
//! crates agree on.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

// ─── Boot media ────────────────────────────────────────────────────────────

/// Which bootable storage device the node is currently running from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSlot {
    Primary,
    Recovery,
}

impl MediaSlot {
    /// The other slot — what a media switch flips to.
    pub fn opposite(self) -> Self {
        match self {
            Self::Primary => Self::Recovery,
            Self::Recovery => Self::Primary,
        }
    }
}

impl std::fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

// ─── Recovery tiers ────────────────────────────────────────────────────────

/// One tier of the recovery ladder.
///
/// Equality and ordering of a ladder entry are `(threshold, ActionKind)`;
/// this enum supplies the second half of that pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Restart networking services and fix up modem port permissions.
    Network,
    /// Soft reboot, bounded by a max-resets counter.
    Soft,
    /// Hard power cycle, eventually a boot-media switch.
    Hard,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

// ─── Uplink targets ────────────────────────────────────────────────────────

/// A single reverse-SSH uplink target a health probe checks.
///
/// `alias` is the tag attached to the published `sys.rssh_up` metric for
/// this target (§6, §11.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkTarget {
    pub alias: String,
    pub host: String,
    pub port: u16,
}

impl UplinkTarget {
    pub fn new(alias: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            alias: alias.into(),
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for UplinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}:{})", self.alias, self.host, self.port)
    }
}
