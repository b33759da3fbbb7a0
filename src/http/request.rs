use bytes::Bytes;
use http::{Method, Version};

/// A fully received HTTP request
///
/// Header names are kept exactly as sent; the body is already de-chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Bytes,
}

/// Items produced by the request decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFrame {
    /// The client sent `Expect: 100-continue` and is waiting before sending its body
    Continue,
    /// A complete request, body included
    Request(EchoRequest),
}

impl EchoRequest {
    /// Iterates over the values of every header named `name`, case-insensitively
    pub fn header_values<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a [u8]> + use<'a, 'n> {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// First value of the header named `name`
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.header_values(name).next()
    }

    /// Whether the connection may carry another request after this one
    pub fn keep_alive(&self) -> bool {
        should_keep_alive(self.version, self.header_values("connection"))
    }

    /// Body decoded as UTF-8, with invalid sequences replaced
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Checks if a connection should be kept alive
///
/// HTTP/1.0 needs an explicit `keep-alive` token, HTTP/1.1 stays open
/// unless a `close` token is present.
pub fn should_keep_alive<'a>(
    version: Version,
    connection: impl IntoIterator<Item = &'a [u8]>,
) -> bool {
    let mut close = false;
    let mut keep_alive = false;
    for value in connection {
        for token in value.split(|&b| b == b',') {
            let token = token.trim_ascii();
            if token.eq_ignore_ascii_case(b"close") {
                close = true;
            } else if token.eq_ignore_ascii_case(b"keep-alive") {
                keep_alive = true;
            }
        }
    }

    match version {
        Version::HTTP_10 => keep_alive && !close,
        _ => !close,
    }
}

/// Whether the request head asks for an interim `100 Continue`
pub(crate) fn expects_continue(version: Version, headers: &[(String, Vec<u8>)]) -> bool {
    version == Version::HTTP_11
        && headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case("expect") && value.trim_ascii().eq_ignore_ascii_case(b"100-continue")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(version: Version, headers: &[(&str, &str)]) -> EchoRequest {
        EchoRequest {
            method: Method::GET,
            target: "/".to_string(),
            version,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.as_bytes().to_vec()))
                .collect(),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_should_keep_alive() {
        assert!(!request(Version::HTTP_10, &[]).keep_alive());
        assert!(request(Version::HTTP_11, &[]).keep_alive());

        assert!(!request(Version::HTTP_10, &[("Connection", "close")]).keep_alive());
        assert!(!request(Version::HTTP_11, &[("Connection", "close")]).keep_alive());

        assert!(request(Version::HTTP_10, &[("Connection", "keep-alive")]).keep_alive());
        assert!(request(Version::HTTP_11, &[("connection", "Keep-Alive")]).keep_alive());
    }

    #[test]
    fn test_header_value_outlives_name() {
        let req = request(Version::HTTP_11, &[("X-Test", "1"), ("x-test", "2")]);
        let value = {
            let name = String::from("X-TEST");
            req.header(&name)
        };
        assert_eq!(value, Some(&b"1"[..]));

        let values: Vec<&[u8]> = req.header_values("x-test").collect();
        assert_eq!(values, vec![&b"1"[..], &b"2"[..]]);
    }

    #[test]
    fn test_connection_tokens() {
        assert!(!request(Version::HTTP_11, &[("Connection", "Upgrade, Close")]).keep_alive());
        assert!(!request(
            Version::HTTP_11,
            &[("Connection", "keep-alive"), ("Connection", "close")]
        )
        .keep_alive());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = request(Version::HTTP_11, &[("X-Test", "1"), ("x-test", "2")]);
        assert_eq!(req.header("X-TEST"), Some(&b"1"[..]));
        assert_eq!(req.header_values("x-test").count(), 2);
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn test_expects_continue() {
        let headers = vec![("Expect".to_string(), b"100-Continue".to_vec())];
        assert!(expects_continue(Version::HTTP_11, &headers));
        assert!(!expects_continue(Version::HTTP_10, &headers));
        assert!(!expects_continue(Version::HTTP_11, &[]));
    }

    #[test]
    fn test_body_text_replaces_invalid_utf8() {
        let mut req = request(Version::HTTP_11, &[]);
        req.body = Bytes::from_static(b"ok \xff");
        assert_eq!(req.body_text(), "ok \u{fffd}");
    }
}
