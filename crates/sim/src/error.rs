use thiserror::Error;

/// Errors raised by flight and sensor operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlightError {
    /// The camera name does not match any mounted camera.
    #[error("unknown camera: {0}")]
    UnknownCamera(String),

    /// A flight command was issued while the vehicle is disarmed.
    #[error("vehicle is not armed")]
    NotArmed,

    /// A movement command was issued while the vehicle is on the ground.
    #[error("vehicle is not airborne")]
    NotAirborne,

    /// A command argument is outside the accepted range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The simulator rejected or aborted the command.
    #[error("{operation} failed: {reason}")]
    Command {
        operation: &'static str,
        reason: String,
    },

    /// An image could not be produced or decoded.
    #[error("image error: {0}")]
    Image(String),

    /// The vehicle state could not be read.
    #[error("vehicle state unavailable")]
    Unavailable,

    /// An I/O error occurred while loading simulator assets.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlightError>;
