use super::codec::RequestDecoder;
use super::config::HttpConfig;
use super::handler::EchoHandler;
use super::idle::IdleTimeout;
use super::protocol::HttpProtocolError;
use super::request::RequestFrame;
use super::response::{HttpResponse, CONTINUE};
use crate::common::EchoServerTrait;
use crate::security::{ConnectionMetrics, ConnectionTracker};
use crate::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::{signal, time::timeout};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn, Instrument};

/// HTTP echo server
///
/// The listener is bound by [`HttpEchoServer::bind`], so the address is
/// known (and connectable) before [`EchoServerTrait::run`] starts the
/// accept loop. Each connection is served on its own task.
///
/// # Examples
///
/// ```no_run
/// use reqecho::http::{HttpConfig, HttpEchoServer};
/// use reqecho::common::EchoServerTrait;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = HttpEchoServer::bind(HttpConfig::default()).await?;
///     println!("listening on {}", server.local_addr()?);
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpEchoServer {
    config: Arc<HttpConfig>,
    listener: TcpListener,
    tracker: Arc<ConnectionTracker>,
    shutdown_signal: broadcast::Sender<()>,
    // Subscribed at bind time so a signal sent before `run` is not lost
    shutdown_rx: Mutex<Option<broadcast::Receiver<()>>>,
}

impl HttpEchoServer {
    /// Binds the listening socket
    pub async fn bind(config: HttpConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_signal, shutdown_rx) = broadcast::channel(1);
        Ok(Self {
            tracker: Arc::new(ConnectionTracker::new(config.max_connections)),
            config: Arc::new(config),
            listener,
            shutdown_signal,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        })
    }

    /// The address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        self.tracker.metrics()
    }

    /// Serves requests on one connection until it closes
    async fn handle_connection(stream: TcpStream, addr: SocketAddr, config: Arc<HttpConfig>) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut requests = FramedRead::with_capacity(
            IdleTimeout::new(reader, config.read_timeout),
            RequestDecoder::new(config.limits.clone()),
            config.buffer_size,
        );
        let server_name = config.server_name.as_deref();
        // Cleared once a request goes unanswered; later requests queue behind it forever
        let mut answering = true;

        loop {
            let frame = match requests.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(HttpProtocolError::Io(e))) if e.kind() == io::ErrorKind::TimedOut => {
                    warn!(%addr, "Read timeout");
                    break;
                }
                Some(Err(e)) => {
                    if let Some(status) = e.status().filter(|_| answering) {
                        let response = HttpResponse::error(status).encode(false, server_name);
                        if let Err(write_err) =
                            write_response(&mut writer, &response, config.write_timeout).await
                        {
                            debug!(%addr, error = %write_err, "Failed to send error response");
                        }
                    }
                    return Err(e.into());
                }
                None => {
                    info!(%addr, "Client closed connection");
                    break;
                }
            };

            let request = match frame {
                RequestFrame::Continue => {
                    if answering && !write_response(&mut writer, CONTINUE, config.write_timeout).await? {
                        warn!(%addr, "Write timeout");
                        break;
                    }
                    continue;
                }
                RequestFrame::Request(request) => request,
            };

            if !answering {
                debug!(%addr, method = %request.method, "Request queued behind an unanswered one");
                continue;
            }

            debug!(
                %addr,
                method = %request.method,
                target = %request.target,
                body_size = request.body.len(),
                "Received request"
            );

            let Some(response) = EchoHandler.handle(&request)? else {
                info!(%addr, method = %request.method, "Leaving request unanswered");
                answering = false;
                continue;
            };

            let keep_alive = request.keep_alive();
            let encoded = response.encode(keep_alive, server_name);
            if !write_response(&mut writer, &encoded, config.write_timeout).await? {
                warn!(%addr, "Write timeout");
                break;
            }
            info!(
                %addr,
                method = %request.method,
                status = response.status().as_u16(),
                size = response.body().len(),
                "Echoed request"
            );

            if !keep_alive {
                break;
            }
        }

        Ok(())
    }
}

/// Writes and flushes `data`; false if the write timed out
async fn write_response(writer: &mut OwnedWriteHalf, data: &[u8], write_timeout: Duration) -> Result<bool> {
    let write = async {
        writer.write_all(data).await?;
        writer.flush().await
    };
    match timeout(write_timeout, write).await {
        Ok(Ok(())) => Ok(true),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Ok(false),
    }
}

#[async_trait]
impl EchoServerTrait for HttpEchoServer {
    /// Accepts connections until Ctrl-C or the shutdown signal
    async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .lock()
            .ok()
            .and_then(|mut rx| rx.take())
            .unwrap_or_else(|| self.shutdown_signal.subscribe());

        info!(
            address = %self.local_addr()?,
            max_connections = self.config.max_connections,
            "HTTP echo server listening"
        );

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let guard = match self.tracker.try_acquire() {
                                Ok(guard) => guard,
                                Err(e) => {
                                    warn!(%addr, error = %e, "Connection rejected");
                                    continue;
                                }
                            };
                            let current = guard.active_connections();
                            info!(%addr, current, "Accepted connection");

                            let config = Arc::clone(&self.config);
                            let span = tracing::info_span!("connection", %addr);
                            tokio::spawn(async move {
                                let result = Self::handle_connection(stream, addr, config).instrument(span).await;
                                if let Err(e) = result {
                                    error!(%addr, error = %e, "Error handling connection");
                                }
                                drop(guard);
                                info!(%addr, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        info!("HTTP echo server stopped");
        Ok(())
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.clone()
    }
}
