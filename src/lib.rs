use crate::http::protocol::HttpProtocolError;
use thiserror::Error;

/// Error types for the reqecho library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket-level errors (bind, accept, connect, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP framing and parsing errors
    #[error("HTTP protocol error: {0}")]
    Protocol(#[from] HttpProtocolError),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// A peer answered with something other than the expected echo
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A spawned task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// UTF-8 encoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for the reqecho library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod common;
pub mod http;
pub mod security;

// Re-export main types for convenience
pub use common::{EchoClient, EchoServerTrait};
pub use crate::http::{
    EchoHandler, EchoPayload, EchoRequest, HeaderValue, HttpConfig, HttpEchoClient,
    HttpEchoServer, RequestHeaders,
};
pub use security::ResourceLimits;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_panic_maps_to_task_error() {
        let handle: tokio::task::JoinHandle<()> =
            tokio::spawn(async { panic!("server task panicked") });
        let join_err = handle.await.unwrap_err();
        let err = EchoError::from(join_err);
        assert!(matches!(err, EchoError::Task(ref e) if e.is_panic()));
        assert!(err.to_string().starts_with("Task failed"));
    }
}
