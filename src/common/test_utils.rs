use crate::common::EchoServerTrait;
use crate::http::{HttpConfig, HttpEchoServer};
use crate::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A server running on an ephemeral loopback port, for tests and benchmarks
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<()>>,
    shutdown: broadcast::Sender<()>,
}

impl TestServer {
    /// Signals the accept loop to stop and waits for it to return
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle.await?
    }
}

/// Creates a controlled test server with a connection limit
///
/// The listener is bound before this returns, so clients can connect
/// to `addr` immediately.
pub async fn create_controlled_test_server_with_limit(max_connections: usize) -> Result<TestServer> {
    let config = HttpConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_connections,
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        ..HttpConfig::default()
    };
    spawn_test_server(config).await
}

/// Binds and spawns a server with the given configuration
pub async fn spawn_test_server(config: HttpConfig) -> Result<TestServer> {
    let server = HttpEchoServer::bind(config).await?;
    let addr = server.local_addr()?;
    let shutdown = server.shutdown_signal();

    let handle = tokio::spawn(async move { server.run().await });

    Ok(TestServer {
        addr,
        handle,
        shutdown,
    })
}
