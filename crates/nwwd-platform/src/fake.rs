//! A recording, fully controllable [`Platform`] for deterministic tests.
//!
//! Mirrors the source implementation's swappable `time_func`/`health_check`
//! closures (§9 Design Notes) as a single capability object: the clock is
//! advanced explicitly by the test instead of sleeping, and every call is
//! recorded so assertions can inspect exactly what the Engine did.

use crate::Platform;
use nwwd_proto::MediaSlot;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default)]
struct Recording {
    restart_services_calls: Vec<Vec<String>>,
    fix_modem_ports_calls: u32,
    reboot_calls: u32,
    poweroff_calls: u32,
    boot_media_requests: Vec<MediaSlot>,
    watchdog_strokes: u32,
    hardware_touches: u32,
    published_metrics: Vec<(String, f64, Vec<(String, String)>)>,
    boot_success_marks: u32,
}

struct Inner {
    now: Duration,
    current_media: MediaSlot,
    probe_script: VecDeque<bool>,
    probe_default: bool,
    set_next_boot_media_succeeds: bool,
    recording: Recording,
}

/// A fake platform whose clock and probe results are driven entirely by
/// the test, not real elapsed time or real host state.
pub struct FakePlatform {
    inner: RefCell<Inner>,
}

impl FakePlatform {
    pub fn new(current_media: MediaSlot) -> Self {
        Self {
            inner: RefCell::new(Inner {
                now: Duration::ZERO,
                current_media,
                probe_script: VecDeque::new(),
                probe_default: true,
                set_next_boot_media_succeeds: true,
                recording: Recording::default(),
            }),
        }
    }

    /// Moves the fake clock forward by `dt`. Call this once per simulated
    /// tick, mirroring the real loop's end-of-tick sleep.
    pub fn advance(&self, dt: Duration) {
        self.inner.borrow_mut().now += dt;
    }

    /// Queues the next `probe()` result. Once the queue is drained, probe
    /// falls back to [`FakePlatform::set_probe_default`]'s value.
    pub fn queue_probe(&self, ok: bool) {
        self.inner.borrow_mut().probe_script.push_back(ok);
    }

    pub fn queue_probes(&self, results: impl IntoIterator<Item = bool>) {
        self.inner.borrow_mut().probe_script.extend(results);
    }

    pub fn set_probe_default(&self, ok: bool) {
        self.inner.borrow_mut().probe_default = ok;
    }

    pub fn set_next_boot_media_should_fail(&self) {
        self.inner.borrow_mut().set_next_boot_media_succeeds = false;
    }

    pub fn reboot_count(&self) -> u32 {
        self.inner.borrow().recording.reboot_calls
    }

    pub fn poweroff_count(&self) -> u32 {
        self.inner.borrow().recording.poweroff_calls
    }

    pub fn network_restart_count(&self) -> u32 {
        self.inner.borrow().recording.restart_services_calls.len() as u32
    }

    pub fn fix_modem_ports_count(&self) -> u32 {
        self.inner.borrow().recording.fix_modem_ports_calls
    }

    pub fn boot_media_requests(&self) -> Vec<MediaSlot> {
        self.inner.borrow().recording.boot_media_requests.clone()
    }

    pub fn watchdog_strokes(&self) -> u32 {
        self.inner.borrow().recording.watchdog_strokes
    }

    pub fn hardware_touches(&self) -> u32 {
        self.inner.borrow().recording.hardware_touches
    }

    pub fn published_metrics(&self) -> Vec<(String, f64, Vec<(String, String)>)> {
        self.inner.borrow().recording.published_metrics.clone()
    }

    pub fn boot_success_marks(&self) -> u32 {
        self.inner.borrow().recording.boot_success_marks
    }

    /// Sets the current media slot, overriding the one passed to `new`.
    pub fn set_current_media(&self, media: MediaSlot) {
        self.inner.borrow_mut().current_media = media;
    }
}

impl Platform for FakePlatform {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn probe(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.probe_script.pop_front().unwrap_or(inner.probe_default)
    }

    fn restart_services(&self, services: &[String]) {
        self.inner
            .borrow_mut()
            .recording
            .restart_services_calls
            .push(services.to_vec());
    }

    fn fix_modem_ports(&self) {
        self.inner.borrow_mut().recording.fix_modem_ports_calls += 1;
    }

    fn reboot(&self) {
        self.inner.borrow_mut().recording.reboot_calls += 1;
    }

    fn poweroff(&self) {
        self.inner.borrow_mut().recording.poweroff_calls += 1;
    }

    fn set_next_boot_media(&self, target: MediaSlot) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.recording.boot_media_requests.push(target);
        inner.set_next_boot_media_succeeds
    }

    fn current_media(&self) -> MediaSlot {
        self.inner.borrow().current_media
    }

    fn stroke_software_watchdog(&self) {
        self.inner.borrow_mut().recording.watchdog_strokes += 1;
    }

    fn touch_hardware_watchdog_token(&self) {
        self.inner.borrow_mut().recording.hardware_touches += 1;
    }

    fn publish_metric(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        self.inner.borrow_mut().recording.published_metrics.push((
            name.to_string(),
            value,
            tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ));
    }

    fn mark_boot_successful(&self) {
        self.inner.borrow_mut().recording.boot_success_marks += 1;
    }
}
