//! The concrete Linux `Platform`: shells out to `systemctl`, `ss`,
//! `nvbootctrl`-equivalent media tooling, and `systemd-notify`, treating a
//! nonzero exit as a logged, non-fatal failure.

use crate::Platform;
use nwwd_proto::{MediaSlot, UplinkTarget};
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Queries the bootloader for the currently active boot slot before the
/// main loop starts. Falls back to [`MediaSlot::Primary`] if the tool is
/// unavailable or its output is unrecognised: an edge node that cannot tell
/// which medium it booted from should still start the watchdog rather than
/// refuse to run.
pub fn detect_current_media() -> MediaSlot {
    match Command::new("nvbootctrl").arg("get-current-slot").output() {
        Ok(o) if o.status.success() => {
            match String::from_utf8_lossy(&o.stdout).trim() {
                "1" => MediaSlot::Recovery,
                _ => MediaSlot::Primary,
            }
        }
        Ok(o) => {
            warn!(status = %o.status, "nvbootctrl get-current-slot failed, assuming primary");
            MediaSlot::Primary
        }
        Err(e) => {
            warn!(error = %e, "failed to invoke nvbootctrl, assuming primary");
            MediaSlot::Primary
        }
    }
}

/// Reverse-SSH uplink targets plus the hardware-watchdog token path this
/// node was configured with, and the medium it was booted from.
pub struct LinuxPlatform {
    uplinks: Vec<UplinkTarget>,
    ssh_ok_file: Option<PathBuf>,
    current_media: MediaSlot,
    started_at: Instant,
}

impl LinuxPlatform {
    /// Builds a platform for this host. `current_media` is queried once,
    /// by the caller, at startup (§4.F) — typically from the bootloader's
    /// own status tool — and handed in here.
    pub fn new(
        uplinks: Vec<UplinkTarget>,
        ssh_ok_file: Option<PathBuf>,
        current_media: MediaSlot,
    ) -> Self {
        Self {
            uplinks,
            ssh_ok_file,
            current_media,
            started_at: Instant::now(),
        }
    }

    /// Checks whether an established TCP connection on `target.port`
    /// exists, confirming a reverse-SSH tunnel is alive without opening a
    /// fresh connection itself.
    fn uplink_established(&self, target: &UplinkTarget) -> bool {
        let output = Command::new("ss")
            .args(["-t", "-n", "state", "established"])
            .output();

        match output {
            Ok(o) if o.status.success() => {
                let port_suffix = format!(":{}", target.port);
                String::from_utf8_lossy(&o.stdout).contains(&port_suffix)
            }
            Ok(o) => {
                warn!(
                    target = %target,
                    status = %o.status,
                    "ss exited non-zero while checking uplink"
                );
                false
            }
            Err(e) => {
                warn!(target = %target, error = %e, "failed to run ss");
                false
            }
        }
    }
}

impl Platform for LinuxPlatform {
    fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn probe(&self) -> bool {
        let mut any_up = false;
        for target in &self.uplinks {
            let up = self.uplink_established(target);
            any_up |= up;
            self.publish_metric(
                "sys.rssh_up",
                if up { 1.0 } else { 0.0 },
                &[("server", &target.alias)],
            );
        }
        any_up
    }

    fn restart_services(&self, services: &[String]) {
        for service in services {
            match Command::new("systemctl").args(["restart", service]).output() {
                Ok(o) if o.status.success() => {
                    debug!(service, "restarted service");
                }
                Ok(o) => {
                    warn!(service, status = %o.status, "service restart failed");
                }
                Err(e) => {
                    warn!(service, error = %e, "failed to invoke systemctl restart");
                }
            }
        }
    }

    fn fix_modem_ports(&self) {
        let ports: Vec<_> = match glob::glob("/dev/ttyACM*") {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(e) => {
                warn!(error = %e, "failed to glob modem ports");
                return;
            }
        };

        if ports.is_empty() {
            return;
        }

        for port in ports {
            if let Err(e) = Command::new("chown")
                .arg("root:root")
                .arg(&port)
                .status()
            {
                warn!(port = %port.display(), error = %e, "failed to chown modem port");
                continue;
            }
            if let Err(e) = Command::new("chmod").arg("660").arg(&port).status() {
                warn!(port = %port.display(), error = %e, "failed to chmod modem port");
            }
        }
    }

    fn reboot(&self) {
        warn!("requesting reboot via systemctl");
        if let Err(e) = Command::new("systemctl").arg("reboot").status() {
            warn!(error = %e, "failed to invoke systemctl reboot");
        }
    }

    fn poweroff(&self) {
        warn!("requesting poweroff via systemctl");
        if let Err(e) = Command::new("systemctl").arg("poweroff").status() {
            warn!(error = %e, "failed to invoke systemctl poweroff");
        }
    }

    fn set_next_boot_media(&self, target: MediaSlot) -> bool {
        let slot = match target {
            MediaSlot::Primary => "0",
            MediaSlot::Recovery => "1",
        };
        match Command::new("nvbootctrl")
            .args(["set-active-boot-slot", slot])
            .output()
        {
            Ok(o) if o.status.success() => {
                debug!(target = %target, "committed next-boot media");
                true
            }
            Ok(o) => {
                warn!(target = %target, status = %o.status, "failed to set next-boot media");
                false
            }
            Err(e) => {
                warn!(target = %target, error = %e, "failed to invoke nvbootctrl");
                false
            }
        }
    }

    fn current_media(&self) -> MediaSlot {
        self.current_media
    }

    fn stroke_software_watchdog(&self) {
        if let Err(e) = Command::new("systemd-notify")
            .arg("WATCHDOG=1")
            .status()
        {
            warn!(error = %e, "failed to stroke systemd watchdog");
        }
    }

    fn touch_hardware_watchdog_token(&self) {
        let Some(path) = &self.ssh_ok_file else {
            return;
        };
        if let Err(e) = Command::new("touch").arg(path).status() {
            warn!(path = %path.display(), error = %e, "failed to touch hardware watchdog token");
        }
    }

    fn publish_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        let mut args = vec![name.to_string(), value.to_string()];
        for (k, v) in tags {
            args.push(format!("{k}={v}"));
        }
        if let Err(e) = Command::new("waggle-publish-metric").args(&args).output() {
            warn!(name, error = %e, "failed to publish metric");
        }
    }

    fn mark_boot_successful(&self) {
        for (cmd, args) in [
            ("nvbootctrl", &["dump-slots-info"][..]),
            ("nv_update_engine", &["-v"][..]),
            ("nvbootctrl", &["mark-boot-successful"][..]),
        ] {
            if let Err(e) = Command::new(cmd).args(args).output() {
                warn!(cmd, error = %e, "boot-success marking step failed");
            }
        }
    }
}
