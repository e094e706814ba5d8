//! CLI error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The flight log does not exist.
    ///
    /// This typically means no agent run has been started yet.
    #[error("flight log not found at {path}. Run 'drone-agent run' first")]
    DatabaseNotFound { path: PathBuf },

    /// No data directory could be determined for this platform.
    #[error("could not determine a data directory")]
    NoDataDir,

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the agent layer.
    #[error(transparent)]
    Agent(#[from] agent::Error),

    /// The simulator could not be set up.
    #[error(transparent)]
    Flight(#[from] sim::FlightError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
