use super::payload::EchoPayload;
use crate::common::EchoClient;
use crate::{EchoError, Result};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use http::{Method, StatusCode};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Configuration for HTTP echo clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for response bytes
    pub read_timeout: Duration,
    /// Write timeout for requests
    pub write_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read buffer growth step
    pub buffer_size: usize,
    /// Maximum response size to prevent memory exhaustion
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 8192,
            max_response_size: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Builder for client configuration
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A response read back from the server
#[derive(Debug, Clone)]
pub struct EchoReply {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EchoReply {
    /// First value of the header named `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decodes the body as an echo payload
    pub fn payload(&self) -> Result<EchoPayload> {
        EchoPayload::from_json(&self.body)
    }
}

/// HTTP test client for the echo server
///
/// Keeps one connection open and reads exactly one response per request,
/// so several requests can share a keep-alive connection.
///
/// # Examples
///
/// ```no_run
/// use reqecho::http::HttpEchoClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let addr = "127.0.0.1:8080".parse()?;
///     let mut client = HttpEchoClient::connect(addr).await?;
///
///     let reply = client.post(&[("X-Test", "1")], b"hello world").await?;
///     let payload = reply.payload()?;
///     assert_eq!(payload.request_body.as_deref(), Some("hello world"));
///     Ok(())
/// }
/// ```
pub struct HttpEchoClient {
    stream: TcpStream,
    addr: SocketAddr,
    config: ClientConfig,
    buffer: BytesMut,
}

impl HttpEchoClient {
    /// Connect to a server with custom configuration
    pub async fn connect_with_config(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| EchoError::Timeout(format!("Connection to {addr} timed out")))??;
        // Fragmented writes should leave as separate segments
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(config.buffer_size),
            config,
        })
    }

    /// Connect with default configuration
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a GET request with the given extra headers
    pub async fn get(&mut self, headers: &[(&str, &str)]) -> Result<EchoReply> {
        let request = self.build_request(Method::GET, headers, None);
        self.send_raw(&request).await
    }

    /// Sends a POST request with a `Content-Length` framed body
    pub async fn post(&mut self, headers: &[(&str, &str)], body: &[u8]) -> Result<EchoReply> {
        let request = self.build_request(Method::POST, headers, Some(body));
        self.send_raw(&request).await
    }

    /// Sends a request with any method and waits for its response
    pub async fn request(
        &mut self,
        method: Method,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<EchoReply> {
        let request = self.build_request(method, headers, body);
        self.send_raw(&request).await
    }

    /// Sends a POST whose body goes out in `pieces` separate writes, `pause` apart
    pub async fn post_fragmented(
        &mut self,
        headers: &[(&str, &str)],
        body: &[u8],
        pieces: usize,
        pause: Duration,
    ) -> Result<EchoReply> {
        let request = self.build_request(Method::POST, headers, Some(body));
        let head_len = request.len() - body.len();
        self.write_all(&request[..head_len]).await?;

        let piece_len = body.len().div_ceil(pieces.max(1)).max(1);
        for piece in body.chunks(piece_len) {
            tokio::time::sleep(pause).await;
            self.write_all(piece).await?;
        }

        self.read_reply().await
    }

    /// Writes raw request bytes and reads one response
    pub async fn send_raw(&mut self, request: &[u8]) -> Result<EchoReply> {
        self.write_all(request).await?;
        self.read_reply().await
    }

    /// Writes raw bytes without waiting for anything
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let write_timeout = self.config.write_timeout;
        let stream = &mut self.stream;
        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        timeout(write_timeout, write)
            .await
            .map_err(|_| EchoError::Timeout("Write timeout".to_string()))??;
        Ok(())
    }

    /// Whether the server closes the connection within `wait`
    pub async fn wait_closed(&mut self, wait: Duration) -> Result<bool> {
        match timeout(wait, self.stream.read_buf(&mut self.buffer)).await {
            Ok(Ok(0)) => Ok(true),
            Ok(Ok(_)) => Ok(false),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    fn build_request(&self, method: Method, headers: &[(&str, &str)], body: Option<&[u8]>) -> Vec<u8> {
        let mut head = format!("{method} / HTTP/1.1\r\n");
        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("host")) {
            head.push_str(&format!("Host: {}\r\n", self.addr));
        }
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(body) = body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut request = head.into_bytes();
        request.extend_from_slice(body.unwrap_or_default());
        request
    }

    /// Reads one final response, skipping `100 Continue`
    async fn read_reply(&mut self) -> Result<EchoReply> {
        loop {
            match self.try_parse_reply()? {
                Some(reply) if reply.status == StatusCode::CONTINUE => continue,
                Some(reply) => return Ok(reply),
                None => self.fill_buffer().await?,
            }
        }
    }

    fn try_parse_reply(&mut self) -> Result<Option<EchoReply>> {
        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut res = httparse::Response::new(&mut headers);
        let head_len = match res
            .parse(&self.buffer)
            .map_err(|e| EchoError::UnexpectedResponse(format!("Failed to parse response head: {e}")))?
        {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => return Ok(None),
        };

        let status = StatusCode::from_u16(res.code.unwrap_or_default())
            .map_err(|e| EchoError::UnexpectedResponse(format!("Invalid status code: {e}")))?;
        let headers: Vec<(String, String)> = res
            .headers
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.trim().parse::<usize>())
            .transpose()
            .map_err(|e| EchoError::UnexpectedResponse(format!("Invalid Content-Length: {e}")))?
            .unwrap_or(0);

        if self.buffer.len() < head_len + content_length {
            return Ok(None);
        }
        self.buffer.advance(head_len);
        let body = self.buffer.split_to(content_length).to_vec();

        Ok(Some(EchoReply {
            status,
            headers,
            body,
        }))
    }

    async fn fill_buffer(&mut self) -> Result<()> {
        self.buffer.reserve(self.config.buffer_size);
        let n = timeout(self.config.read_timeout, self.stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| {
                EchoError::Timeout(format!("No response within {:?}", self.config.read_timeout))
            })??;

        if n == 0 {
            return Err(EchoError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed before a full response arrived",
            )));
        }
        if self.buffer.len() > self.config.max_response_size {
            return Err(EchoError::UnexpectedResponse(format!(
                "Response too large: {} bytes, max allowed: {}",
                self.buffer.len(),
                self.config.max_response_size
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EchoClient for HttpEchoClient {
    /// POSTs `data` and returns the body the server reflected back
    async fn echo(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let reply = self.post(&[], data).await?;
        if reply.status != StatusCode::OK {
            return Err(EchoError::UnexpectedResponse(format!("Status {}", reply.status)));
        }
        reply
            .payload()?
            .request_body
            .map(String::into_bytes)
            .ok_or_else(|| EchoError::UnexpectedResponse("Missing RequestBody".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfigBuilder::new()
            .read_timeout(Duration::from_secs(60))
            .write_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_millis(100))
            .buffer_size(2048)
            .max_response_size(1024 * 1024)
            .build();

        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.write_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.max_response_size, 1024 * 1024);
    }

    #[test]
    fn test_reply_header_lookup() {
        let reply = EchoReply {
            status: StatusCode::OK,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: br#"{"RequestHeader":{}}"#.to_vec(),
        };
        assert_eq!(reply.header("content-type"), Some("application/json"));
        assert_eq!(reply.header("missing"), None);
        assert!(reply.payload().unwrap().request_header.is_empty());
    }
}
