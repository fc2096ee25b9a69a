//! The Action Set (§4.D): NETWORK, SOFT, and HARD. Each closes over the
//! configuration and the Platform, the way the source bound actions over
//! outer variables (§9) — here as an explicit [`ActionContext`] instead of
//! a closure.

use crate::CounterPaths;
use nwwd_config::Config;
use nwwd_persist::CounterStore;
use nwwd_platform::Platform;
use tracing::{info, warn};

pub(crate) struct ActionContext<'a, P: Platform> {
    pub config: &'a Config,
    pub counters: &'a CounterStore,
    pub platform: &'a P,
    pub paths: &'a CounterPaths,
}

impl<P: Platform> ActionContext<'_, P> {
    /// Logs current media and all three counters, the way the source logs
    /// a scoreboard immediately before a reboot/poweroff call (§11.1).
    fn log_scoreboard(&self, reason: &str) {
        info!(
            reason,
            media = %self.platform.current_media(),
            network = self.counters.read(&self.paths.network),
            soft = self.counters.read(&self.paths.soft),
            hard = self.counters.read(&self.paths.hard),
            "scoreboard"
        );
    }
}

/// Restart networking services and fix modem port permissions. Never
/// reboots; always returns control to the Engine.
pub(crate) fn run_network<P: Platform>(ctx: &ActionContext<P>) {
    ctx.platform.fix_modem_ports();
    ctx.platform.restart_services(&ctx.config.network_services);
    ctx.counters.increment(&ctx.paths.network);
    info!("ran network-restart recovery action");
}

/// Soft reboot, bounded by `soft_max_resets`. The counter is only
/// incremented when the limit has not yet been reached (§4.D, §9 Open
/// Questions).
pub(crate) fn run_soft<P: Platform>(ctx: &ActionContext<P>) {
    let n = ctx.counters.read(&ctx.paths.soft);
    if n < ctx.config.soft.max_resets {
        ctx.counters.increment(&ctx.paths.soft);
        ctx.log_scoreboard("soft-reboot");
        ctx.platform.reboot();
    } else {
        warn!(resets = n, max = ctx.config.soft.max_resets, "soft reset limit reached, skipping");
    }
}

/// Hard power cycle, eventually a boot-media switch once the hard limit is
/// exhausted. The counter is incremented unconditionally (§4.D) — it
/// records attempts including the one that triggers the switch.
pub(crate) fn run_hard<P: Platform>(ctx: &ActionContext<P>) {
    let n = ctx.counters.read(&ctx.paths.hard);
    ctx.counters.increment(&ctx.paths.hard);

    if n < ctx.config.hard.max_resets {
        ctx.log_scoreboard("hard-poweroff");
        ctx.platform.poweroff();
        return;
    }

    let target = ctx.platform.current_media().opposite();
    if !ctx.platform.set_next_boot_media(target) {
        warn!(target = %target, "failed to commit next-boot media, continuing anyway");
    }

    // Ordering is load-bearing (§4.D step 4): the boot selection above is
    // committed before counters are cleared, and counters are cleared
    // before the reboot request, so a crash between any two steps cannot
    // leave the node stuck exhausted on the same broken medium.
    ctx.counters.write(&ctx.paths.network, 0);
    ctx.counters.write(&ctx.paths.soft, 0);
    ctx.counters.write(&ctx.paths.hard, 0);

    ctx.log_scoreboard("hard-media-switch");
    ctx.platform.reboot();
}
