use crate::{EchoError, Result};
use async_trait::async_trait;

/// Common trait for echo servers
///
/// Defines the lifecycle every server exposes once it has been bound:
/// run the accept loop, and hand out a sender that stops it.
#[async_trait]
pub trait EchoServerTrait {
    /// Runs the accept loop until a shutdown signal or Ctrl-C arrives
    async fn run(&self) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}

/// Common trait for echo clients
///
/// `echo` sends `data` to the server and returns whatever the server
/// reflected back for it.
#[async_trait]
pub trait EchoClient {
    /// Sends data to the echo server and returns the echoed response
    async fn echo(&mut self, data: &[u8]) -> Result<Vec<u8>>;

    /// Sends a string and returns the echoed string
    async fn echo_string(&mut self, data: &str) -> Result<String> {
        let response = self.echo(data.as_bytes()).await?;
        String::from_utf8(response).map_err(EchoError::Utf8)
    }
}
