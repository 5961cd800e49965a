use crate::client::Operation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("not authorized with the gradebook")]
    Unauthorized,

    #[error("{operation} returned status {status}")]
    Status { operation: Operation, status: u16 },

    #[error("{0} is not supported by the gradebook client")]
    Unsupported(&'static str),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}
