use http::StatusCode;
use std::fmt::Write as _;
use std::time::SystemTime;

/// Interim response for clients that sent `Expect: 100-continue`
pub const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// A response waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Vec<u8>,
}

impl HttpResponse {
    /// `200 OK` carrying a JSON document
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some("application/json"),
            body,
        }
    }

    /// Bodiless error response
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes status line, headers and body
    ///
    /// `Content-Length` is the body's length in bytes.
    pub fn encode(&self, keep_alive: bool, server_name: Option<&str>) -> Vec<u8> {
        let mut head = String::with_capacity(160);
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\n",
            self.status.as_str(),
            self.status.canonical_reason().unwrap_or("")
        );
        if let Some(content_type) = self.content_type {
            let _ = write!(head, "Content-Type: {content_type}\r\n");
        }
        let _ = write!(head, "Content-Length: {}\r\n", self.body.len());
        let _ = write!(
            head,
            "Date: {}\r\n",
            httpdate::fmt_http_date(SystemTime::now())
        );
        let connection = if keep_alive { "keep-alive" } else { "close" };
        let _ = write!(head, "Connection: {connection}\r\n");
        if let Some(server_name) = server_name {
            let _ = write!(head, "Server: {server_name}\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(encoded: &[u8]) -> (String, Vec<u8>) {
        let pos = encoded
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("head terminator");
        (
            String::from_utf8(encoded[..pos].to_vec()).unwrap(),
            encoded[pos + 4..].to_vec(),
        )
    }

    #[test]
    fn test_json_response() {
        let body = br#"{"RequestHeader":{}}"#.to_vec();
        let encoded = HttpResponse::json(body.clone()).encode(true, None);
        let (head, rest) = split(&encoded);

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Type: application/json"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        assert!(head.contains("Date: "));
        assert!(head.contains("Connection: keep-alive"));
        assert!(!head.contains("Server:"));
        assert_eq!(rest, body);
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let body = "{\"RequestBody\":\"h\u{e9}llo \u{1f600}\"}".as_bytes().to_vec();
        assert_ne!(body.len(), "{\"RequestBody\":\"h\u{e9}llo \u{1f600}\"}".chars().count());

        let encoded = HttpResponse::json(body.clone()).encode(false, None);
        let (head, rest) = split(&encoded);
        assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(head.contains("Connection: close"));
        assert_eq!(rest.len(), body.len());
    }

    #[test]
    fn test_error_response() {
        let encoded = HttpResponse::error(StatusCode::BAD_REQUEST).encode(false, Some("reqecho"));
        let (head, rest) = split(&encoded);

        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(head.contains("Content-Length: 0"));
        assert!(head.contains("Server: reqecho"));
        assert!(!head.contains("Content-Type"));
        assert!(rest.is_empty());
    }
}
