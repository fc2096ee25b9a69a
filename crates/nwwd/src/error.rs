//! Daemon error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] nwwd_config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
