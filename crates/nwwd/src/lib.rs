//! nwwd — network connectivity watchdog daemon for field-deployed edge
//! nodes.
//!
//! This crate wires the library crates together: loads configuration
//! (`nwwd-config`), builds the concrete Linux `Platform` (`nwwd-platform`),
//! and drives the `WatchdogEngine` (`nwwd-health`) tick loop. `main.rs`
//! owns only the CLI surface; the subcommand bodies live here so they can
//! be exercised without going through `clap`.

#![forbid(unsafe_code)]

pub mod error;

use anyhow::Context;
use nwwd_config::Config;
use nwwd_health::WatchdogEngine;
use nwwd_persist::CounterStore;
use nwwd_platform::linux::{self, LinuxPlatform};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Marks the current boot successful, then loads configuration, builds the
/// concrete platform, and runs the tick loop forever (§5). Boot-success
/// marking happens before configuration is touched (§11.2): a node
/// reflashed with a broken `nw/config.ini` must not roll back to the other
/// boot medium just because its config failed to load. Only returns on an
/// unrecoverable configuration error.
pub fn run(nw_config_path: &Path, system_config_path: &Path) -> anyhow::Result<()> {
    let current_media = linux::detect_current_media();
    LinuxPlatform::new(Vec::new(), None, current_media).mark_boot_successful();

    let config = load_config(nw_config_path, system_config_path)?;
    let platform = LinuxPlatform::new(
        config.rssh_addrs.clone(),
        config.ssh_ok_file.clone(),
        current_media,
    );

    let mut engine = WatchdogEngine::new(config, platform);
    engine.log_scoreboard("startup");

    loop {
        engine.update();
        engine.platform().stroke_software_watchdog();
        engine.platform().touch_hardware_watchdog_token();
        std::thread::sleep(Duration::from_secs_f64(engine.config().period_secs));
    }
}

/// Reads the three counter files and the current media slot and prints
/// them, without starting the loop: an operator-facing one-shot view of
/// the same scoreboard the daemon logs at startup (§11.1).
pub fn scoreboard(nw_config_path: &Path, system_config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(nw_config_path, system_config_path)?;
    let current_media = linux::detect_current_media();
    let paths = nwwd_health::CounterPaths::resolve(&config, current_media);
    let counters = CounterStore::new();

    println!("media:   {current_media}");
    println!("network: {}", counters.read(&paths.network));
    println!("soft:    {}", counters.read(&paths.soft));
    println!("hard:    {}", counters.read(&paths.hard));

    Ok(())
}

/// Writes sample `nw/config.ini` and `config.ini` files under `output`,
/// populated with the documented defaults and placeholder values for the
/// fields that have none (§10.5).
pub fn init_config(output: &Path) -> anyhow::Result<()> {
    let nw_dir = output.join("nw");
    std::fs::create_dir_all(&nw_dir)
        .with_context(|| format!("failed to create {}", nw_dir.display()))?;

    std::fs::write(nw_dir.join("config.ini"), SAMPLE_NW_CONFIG)
        .with_context(|| format!("failed to write {}", nw_dir.join("config.ini").display()))?;
    std::fs::write(output.join("config.ini"), SAMPLE_SYSTEM_CONFIG)
        .with_context(|| format!("failed to write {}", output.join("config.ini").display()))?;

    info!(output = %output.display(), "wrote sample configuration");
    Ok(())
}

fn load_config(nw_config_path: &Path, system_config_path: &Path) -> anyhow::Result<Config> {
    Config::load(nw_config_path, system_config_path)
        .map_err(error::DaemonError::from)
        .context("failed to load configuration")
}

const SAMPLE_NW_CONFIG: &str = "\
[all]
health_check_period = 15.0
health_check_history = 600.0
health_check_healthy_perc = 0.7
health_check_recovery_perc = 0.3
rssh_addrs = beekeeper:uplink.example.org:20022
network_services = networking,ModemManager
sd_card_storage_loc = /media/mmcblk0p1

[network-reboot]
reset_start = 1800
reset_interval = 900
current_reset_file = network_resets

[soft-reboot]
reset_start = 10800
max_resets = 3
current_reset_file = soft_resets

[hard-reboot]
reset_start = 21600
max_resets = 2
current_reset_file = hard_resets
";

const SAMPLE_SYSTEM_CONFIG: &str = "\
[reverse-tunnel]
host = uplink.example.org
port = 20022

[watchdog]
ssh_ok_file = /run/nwwd/hw_wdog
";
