//! nwwd — network connectivity watchdog daemon.
//!
//! Watches uplink connectivity and escalates through a recovery ladder
//! (restart networking, soft reboot, hard reboot / boot-media switch) when
//! it stays unreachable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nwwd")]
#[command(about = "Network connectivity watchdog daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watchdog loop
    Run {
        /// Path to nw/config.ini (recovery ladder tuning)
        #[arg(long, default_value = "/etc/nwwd/nw/config.ini")]
        nw_config: PathBuf,

        /// Path to config.ini (reverse tunnel, hardware watchdog token)
        #[arg(long, default_value = "/etc/nwwd/config.ini")]
        system_config: PathBuf,
    },

    /// Write sample nw/config.ini and config.ini files
    InitConfig {
        /// Directory to write the sample files into
        #[arg(short, long, default_value = "/etc/nwwd")]
        output: PathBuf,
    },

    /// Print the current media slot and the three recovery counters
    Scoreboard {
        #[arg(long, default_value = "/etc/nwwd/nw/config.ini")]
        nw_config: PathBuf,

        #[arg(long, default_value = "/etc/nwwd/config.ini")]
        system_config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("nwwd=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            nw_config,
            system_config,
        } => nwwd::run(&nw_config, &system_config),
        Commands::InitConfig { output } => nwwd::init_config(&output),
        Commands::Scoreboard {
            nw_config,
            system_config,
        } => nwwd::scoreboard(&nw_config, &system_config),
    };

    if let Err(e) = &result {
        error!(error = %e, "nwwd exited with an error");
    }

    result
}
