use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use upstream::UpstreamError;

/// Errors raised by the gateway server itself.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Request-level failures. Each maps to a status code and an
/// `{ok: false, error}` body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed request input, rejected before any upstream call.
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("not_found")]
    NotFound,

    #[error("method_not_allowed")]
    MethodNotAllowed,

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) | ApiError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        let message = self.to_string();
        ErrorBody {
            ok: false,
            error: if message.is_empty() {
                "internal_error".to_string()
            } else {
                message
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}
