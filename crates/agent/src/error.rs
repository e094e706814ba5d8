use crate::model::ModelError;
use crate::tools::ToolError;
use sim::FlightError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Flight(#[from] FlightError),
}

pub type Result<T> = std::result::Result<T, Error>;
