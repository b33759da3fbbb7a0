use crate::security::ResourceLimits;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the HTTP echo server
///
/// The service itself takes no external configuration; the binary runs
/// with [`HttpConfig::default`]. Tests override fields to bind an
/// ephemeral port or tighten limits.
///
/// # Examples
///
/// ```rust
/// use reqecho::http::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig {
///     bind_addr: "127.0.0.1:0".parse().unwrap(),
///     read_timeout: Duration::from_secs(5),
///     ..HttpConfig::default()
/// };
/// assert_eq!(config.max_connections, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Initial capacity of the per-connection read buffer
    pub buffer_size: usize,
    /// Longest a connection may go without receiving any bytes while a
    /// request is awaited or still arriving
    pub read_timeout: Duration,
    /// Write timeout for responses
    pub write_timeout: Duration,
    /// Server name to include in responses (optional)
    pub server_name: Option<String>,
    /// Limits applied while decoding requests
    pub limits: ResourceLimits,
}

/// The fixed port the service listens on
pub const DEFAULT_PORT: u16 = 8080;

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            buffer_size: 8192,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            server_name: None,
            limits: ResourceLimits::default(),
        }
    }
}
