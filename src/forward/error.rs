//! Errors raised while forwarding, and their mapping onto [`Failure`].

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::forward::response::Failure;

#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request was dispatched but nothing came back.
    #[error("{0}")]
    NoResponse(#[source] reqwest::Error),

    /// Failure before anything left the proxy.
    #[error("{0}")]
    Dispatch(#[source] reqwest::Error),

    /// The upstream answered, then the body could not be read.
    #[error("failed to read upstream body ({status}): {source}")]
    Body {
        status: StatusCode,
        partial: Option<Value>,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream response exceeds {limit} bytes")]
    TooLarge {
        status: StatusCode,
        limit: usize,
        partial: Option<Value>,
    },
}

impl ForwardError {
    /// Classify an error returned by `RequestBuilder::send`.
    pub fn from_send(error: reqwest::Error) -> Self {
        if error.is_builder() {
            ForwardError::Dispatch(error)
        } else {
            ForwardError::NoResponse(error)
        }
    }

    /// Classify an error raised while reading a body that already has a status.
    pub fn from_body(status: StatusCode, partial: Option<Value>, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ForwardError::NoResponse(error)
        } else {
            ForwardError::Body {
                status,
                partial,
                source: error,
            }
        }
    }

    pub fn into_failure(self) -> Failure {
        match self {
            ForwardError::Body { status, partial, .. }
            | ForwardError::TooLarge { status, partial, .. } => {
                Failure::upstream_error(status, partial)
            }
            ForwardError::NoResponse(e) => Failure::no_response(e.to_string()),
            other => Failure::internal(other.to_string()),
        }
    }
}
