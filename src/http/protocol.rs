use crate::security::SizeError;
use http::StatusCode;
use std::io;

/// Errors raised while reading HTTP requests off the wire
#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request head too large: {0}")]
    HeadTooLarge(SizeError),
    #[error("Too many headers, maximum allowed: {max}")]
    TooManyHeaders { max: usize },
    #[error("Request body too large: {0}")]
    BodyTooLarge(SizeError),
    #[error("Incomplete request")]
    IncompleteRequest,
}

impl HttpProtocolError {
    /// Status code to answer with before closing, if the peer can still be told
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::HttpParse(_) | HttpProtocolError::InvalidRequest(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            HttpProtocolError::HeadTooLarge(_) | HttpProtocolError::TooManyHeaders { .. } => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            HttpProtocolError::BodyTooLarge(_) => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpProtocolError::Io(_) | HttpProtocolError::IncompleteRequest => None,
        }
    }
}

impl From<httparse::Error> for HttpProtocolError {
    fn from(err: httparse::Error) -> Self {
        HttpProtocolError::HttpParse(format!("Failed to parse request head: {err}"))
    }
}
