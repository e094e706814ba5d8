use thiserror::Error;

/// Errors from model provider calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The provider returned a non-success status.
    #[error("provider api: {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The backend is missing required configuration.
    #[error("backend config: {0}")]
    Config(String),
}
