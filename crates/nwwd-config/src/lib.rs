//! INI configuration loading for the network watchdog daemon.
//!
//! Two files make up a node's configuration: `nw/config.ini` (the recovery
//! ladder's tuning — periods, thresholds, counter file locations, uplink
//! list) and `config.ini` (the reverse tunnel and the hardware watchdog
//! token path). [`Config::load`] reads both, applies the documented
//! defaults, validates the cross-field invariants the core relies on, and
//! hands back one immutable [`Config`]. The core never touches the
//! filesystem for configuration itself.

#![forbid(unsafe_code)]

use ini::Ini;
use nwwd_proto::{MediaSlot, UplinkTarget};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_PERIOD_SECS: f64 = 15.0;
const DEFAULT_HISTORY_SECS: f64 = 600.0;
const DEFAULT_HEALTHY_RATIO: f64 = 0.7;
const DEFAULT_RECOVERY_RATIO: f64 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ini file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    #[error("missing required key [{section}] {key} in {path}")]
    MissingKey {
        path: PathBuf,
        section: &'static str,
        key: &'static str,
    },

    #[error("invalid value for [{section}] {key} in {path}: {value:?}")]
    InvalidValue {
        path: PathBuf,
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error(
        "recovery_ratio ({recovery}) must be <= healthy_ratio ({healthy})"
    )]
    InvalidRatios { recovery: f64, healthy: f64 },
}

/// Tuning for one tier of the recovery ladder: when it starts counting, how
/// many times it may fire before escalating, and where its counter lives.
#[derive(Debug, Clone, PartialEq)]
pub struct TierConfig {
    pub reset_start: u64,
    pub max_resets: u64,
    pub counter_file: PathBuf,
}

/// The fully loaded, validated, immutable node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub period_secs: f64,
    pub history_secs: f64,
    pub healthy_ratio: f64,
    pub recovery_ratio: f64,

    pub rssh_addrs: Vec<UplinkTarget>,
    pub network_services: Vec<String>,
    pub sd_card_storage_loc: Option<PathBuf>,

    pub network_reset_start: u64,
    pub network_reset_interval: u64,
    pub network_counter_file: PathBuf,

    pub soft: TierConfig,
    pub hard: TierConfig,

    pub reverse_tunnel_host: String,
    pub reverse_tunnel_port: u16,
    pub ssh_ok_file: Option<PathBuf>,
}

impl Config {
    /// Load and validate the two config files named in the external
    /// interfaces section: `nw_config_path` (`nw/config.ini`) and
    /// `system_config_path` (`config.ini`).
    pub fn load(nw_config_path: &Path, system_config_path: &Path) -> Result<Config, ConfigError> {
        let nw = load_ini(nw_config_path)?;
        let sys = load_ini(system_config_path)?;

        let period_secs = parse_opt(&nw, nw_config_path, "all", "health_check_period")?
            .unwrap_or(DEFAULT_PERIOD_SECS);
        let history_secs = parse_opt(&nw, nw_config_path, "all", "health_check_history")?
            .unwrap_or(DEFAULT_HISTORY_SECS);
        let healthy_ratio = parse_opt(&nw, nw_config_path, "all", "health_check_healthy_perc")?
            .unwrap_or(DEFAULT_HEALTHY_RATIO);
        let recovery_ratio = parse_opt(&nw, nw_config_path, "all", "health_check_recovery_perc")?
            .unwrap_or(DEFAULT_RECOVERY_RATIO);

        if recovery_ratio > healthy_ratio {
            return Err(ConfigError::InvalidRatios {
                recovery: recovery_ratio,
                healthy: healthy_ratio,
            });
        }

        let rssh_addrs =
            parse_uplink_list(nw_config_path, get(&nw, nw_config_path, "all", "rssh_addrs")?)?;

        let network_services =
            parse_csv_list(get(&nw, nw_config_path, "all", "network_services")?);

        let sd_card_storage_loc = get(&nw, nw_config_path, "all", "sd_card_storage_loc")
            .ok()
            .map(PathBuf::from);

        let network_reset_start =
            parse_required(&nw, nw_config_path, "network-reboot", "reset_start")?;
        let network_reset_interval =
            parse_required(&nw, nw_config_path, "network-reboot", "reset_interval")?;
        let network_counter_file: PathBuf =
            get(&nw, nw_config_path, "network-reboot", "current_reset_file")?.into();

        let soft = TierConfig {
            reset_start: parse_required(&nw, nw_config_path, "soft-reboot", "reset_start")?,
            max_resets: parse_required(&nw, nw_config_path, "soft-reboot", "max_resets")?,
            counter_file: get(&nw, nw_config_path, "soft-reboot", "current_reset_file")?.into(),
        };

        let hard = TierConfig {
            reset_start: parse_required(&nw, nw_config_path, "hard-reboot", "reset_start")?,
            max_resets: parse_required(&nw, nw_config_path, "hard-reboot", "max_resets")?,
            counter_file: get(&nw, nw_config_path, "hard-reboot", "current_reset_file")?.into(),
        };

        let reverse_tunnel_host =
            get(&sys, system_config_path, "reverse-tunnel", "host")?.to_string();
        let reverse_tunnel_port: u16 =
            parse_required(&sys, system_config_path, "reverse-tunnel", "port")?;

        let ssh_ok_file = get(&sys, system_config_path, "watchdog", "ssh_ok_file")
            .ok()
            .map(PathBuf::from);

        let config = Config {
            period_secs,
            history_secs,
            healthy_ratio,
            recovery_ratio,
            rssh_addrs,
            network_services,
            sd_card_storage_loc,
            network_reset_start,
            network_reset_interval,
            network_counter_file,
            soft,
            hard,
            reverse_tunnel_host,
            reverse_tunnel_port,
            ssh_ok_file,
        };

        if config.history_len() < 1 {
            return Err(ConfigError::InvalidValue {
                path: nw_config_path.to_path_buf(),
                section: "all",
                key: "health_check_history",
                value: history_secs.to_string(),
            });
        }

        Ok(config)
    }

    /// `N = max(1, floor(history_secs / period_secs))`, the Health History
    /// window length.
    pub fn history_len(&self) -> usize {
        if self.period_secs <= 0.0 {
            return 1;
        }
        ((self.history_secs / self.period_secs).floor() as usize).max(1)
    }

    /// Resolve a tier's counter file to an absolute path, applying
    /// `sd_card_storage_loc` as a prefix only when the node is currently
    /// booted from the primary medium (§3).
    pub fn resolve_counter_path(&self, relative: &Path, current_media: MediaSlot) -> PathBuf {
        match (current_media, &self.sd_card_storage_loc) {
            (MediaSlot::Primary, Some(prefix)) => prefix.join(relative),
            _ => relative.to_path_buf(),
        }
    }
}

fn load_ini(path: &Path) -> Result<Ini, ConfigError> {
    Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(source) => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
        ini::Error::Parse(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn get<'a>(
    ini: &'a Ini,
    path: &Path,
    section: &'static str,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    ini.get_from(Some(section), key)
        .ok_or(ConfigError::MissingKey {
            path: path.to_path_buf(),
            section,
            key,
        })
}

fn parse_required<T: FromStr>(
    ini: &Ini,
    path: &Path,
    section: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    let raw = get(ini, path, section, key)?;
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        path: path.to_path_buf(),
        section,
        key,
        value: raw.to_string(),
    })
}

fn parse_opt<T: FromStr>(
    ini: &Ini,
    path: &Path,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match ini.get_from(Some(section), key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                path: path.to_path_buf(),
                section,
                key,
                value: raw.to_string(),
            }),
    }
}

fn parse_csv_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `rssh_addrs` as a comma-separated list of `alias:host:port`
/// triples, e.g. `beekeeper:uplink.example.org:20022,backup:10.0.0.2:22`.
fn parse_uplink_list(path: &Path, raw: &str) -> Result<Vec<UplinkTarget>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let invalid = || ConfigError::InvalidValue {
                path: path.to_path_buf(),
                section: "all",
                key: "rssh_addrs",
                value: entry.to_string(),
            };
            let alias = parts.next().ok_or_else(invalid)?;
            let host = parts.next().ok_or_else(invalid)?;
            let port: u16 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
            Ok(UplinkTarget::new(alias, host, port))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(contents.as_bytes()).expect("write");
        path
    }

    fn minimal_nw_config() -> &'static str {
        "[all]\n\
         health_check_period = 15\n\
         health_check_history = 60\n\
         health_check_healthy_perc = 0.7\n\
         health_check_recovery_perc = 0.3\n\
         rssh_addrs = beekeeper:uplink.example.org:20022\n\
         network_services = networking,ModemManager\n\
         sd_card_storage_loc = /media/mmcblk0p1\n\
         \n\
         [network-reboot]\n\
         reset_start = 30\n\
         reset_interval = 15\n\
         current_reset_file = /var/lib/nwwd/network_resets\n\
         \n\
         [soft-reboot]\n\
         reset_start = 100\n\
         max_resets = 2\n\
         current_reset_file = /var/lib/nwwd/soft_resets\n\
         \n\
         [hard-reboot]\n\
         reset_start = 200\n\
         max_resets = 1\n\
         current_reset_file = /var/lib/nwwd/hard_resets\n"
    }

    fn minimal_system_config() -> &'static str {
        "[reverse-tunnel]\n\
         host = uplink.example.org\n\
         port = 20022\n\
         \n\
         [watchdog]\n\
         ssh_ok_file = /run/nwwd/hw_wdog\n"
    }

    #[test]
    fn loads_a_complete_pair_of_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(dir.path(), "nw_config.ini", minimal_nw_config());
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let config = Config::load(&nw, &sys).expect("load");

        assert_eq!(config.period_secs, 15.0);
        assert_eq!(config.history_len(), 4);
        assert_eq!(config.healthy_ratio, 0.7);
        assert_eq!(config.recovery_ratio, 0.3);
        assert_eq!(config.rssh_addrs.len(), 1);
        assert_eq!(config.rssh_addrs[0].alias, "beekeeper");
        assert_eq!(config.network_services, vec!["networking", "ModemManager"]);
        assert_eq!(config.soft.max_resets, 2);
        assert_eq!(config.hard.reset_start, 200);
        assert_eq!(config.reverse_tunnel_port, 20022);
        assert_eq!(config.ssh_ok_file, Some(PathBuf::from("/run/nwwd/hw_wdog")));
    }

    #[test]
    fn applies_documented_defaults_when_all_section_keys_are_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             rssh_addrs = beekeeper:uplink.example.org:20022\n\
             network_services = networking\n\
             \n\
             [network-reboot]\n\
             reset_start = 30\n\
             reset_interval = 15\n\
             current_reset_file = network_resets\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let config = Config::load(&nw, &sys).expect("load");

        assert_eq!(config.period_secs, DEFAULT_PERIOD_SECS);
        assert_eq!(config.history_secs, DEFAULT_HISTORY_SECS);
        assert_eq!(config.healthy_ratio, DEFAULT_HEALTHY_RATIO);
        assert_eq!(config.recovery_ratio, DEFAULT_RECOVERY_RATIO);
    }

    #[test]
    fn missing_rssh_addrs_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             network_services = networking\n\
             \n\
             [network-reboot]\n\
             reset_start = 30\n\
             reset_interval = 15\n\
             current_reset_file = network_resets\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let err = Config::load(&nw, &sys).expect_err("missing rssh_addrs");
        assert!(matches!(
            err,
            ConfigError::MissingKey { section: "all", key: "rssh_addrs", .. }
        ));
    }

    #[test]
    fn missing_network_services_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             rssh_addrs = beekeeper:uplink.example.org:20022\n\
             \n\
             [network-reboot]\n\
             reset_start = 30\n\
             reset_interval = 15\n\
             current_reset_file = network_resets\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let err = Config::load(&nw, &sys).expect_err("missing network_services");
        assert!(matches!(
            err,
            ConfigError::MissingKey { section: "all", key: "network_services", .. }
        ));
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             rssh_addrs = beekeeper:uplink.example.org:20022\n\
             network_services = networking\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let err = Config::load(&nw, &sys).expect_err("missing network-reboot section");
        assert!(matches!(err, ConfigError::MissingKey { section: "network-reboot", .. }));
    }

    #[test]
    fn recovery_ratio_above_healthy_ratio_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             health_check_healthy_perc = 0.3\n\
             health_check_recovery_perc = 0.7\n\
             \n\
             [network-reboot]\n\
             reset_start = 30\n\
             reset_interval = 15\n\
             current_reset_file = network_resets\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let err = Config::load(&nw, &sys).expect_err("inverted ratios");
        assert!(matches!(err, ConfigError::InvalidRatios { .. }));
    }

    #[test]
    fn resolve_counter_path_prefixes_only_on_primary_medium() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(dir.path(), "nw_config.ini", minimal_nw_config());
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());
        let config = Config::load(&nw, &sys).expect("load");

        let relative = PathBuf::from("soft_resets");
        assert_eq!(
            config.resolve_counter_path(&relative, MediaSlot::Primary),
            PathBuf::from("/media/mmcblk0p1/soft_resets")
        );
        assert_eq!(
            config.resolve_counter_path(&relative, MediaSlot::Recovery),
            PathBuf::from("soft_resets")
        );
    }

    #[test]
    fn history_len_floors_and_floors_to_at_least_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nw = write_file(
            dir.path(),
            "nw_config.ini",
            "[all]\n\
             health_check_period = 15\n\
             health_check_history = 10\n\
             rssh_addrs = beekeeper:uplink.example.org:20022\n\
             network_services = networking\n\
             \n\
             [network-reboot]\n\
             reset_start = 30\n\
             reset_interval = 15\n\
             current_reset_file = network_resets\n\
             \n\
             [soft-reboot]\n\
             reset_start = 100\n\
             max_resets = 2\n\
             current_reset_file = soft_resets\n\
             \n\
             [hard-reboot]\n\
             reset_start = 200\n\
             max_resets = 1\n\
             current_reset_file = hard_resets\n",
        );
        let sys = write_file(dir.path(), "config.ini", minimal_system_config());

        let config = Config::load(&nw, &sys).expect("load");
        assert_eq!(config.history_len(), 1);
    }
}
