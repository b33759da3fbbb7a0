use super::payload::EchoPayload;
use super::request::EchoRequest;
use super::response::HttpResponse;
use crate::Result;
use http::Method;

/// Builds the echo response for a request
///
/// GET is answered with the request headers, POST with the headers and
/// the body. Every other method gets no answer at all: `handle` returns
/// `None` and the caller writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl EchoHandler {
    pub fn handle(&self, request: &EchoRequest) -> Result<Option<HttpResponse>> {
        let payload = match request.method {
            Method::GET => EchoPayload::headers_only(request),
            Method::POST => EchoPayload::with_body(request),
            _ => return Ok(None),
        };
        Ok(Some(HttpResponse::json(payload.to_json()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{StatusCode, Version};

    fn request(method: Method, body: &'static [u8]) -> EchoRequest {
        EchoRequest {
            method,
            target: "/".to_string(),
            version: Version::HTTP_11,
            headers: vec![("X-Test".to_string(), b"1".to_vec())],
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_get_echoes_headers() {
        let response = EchoHandler.handle(&request(Method::GET, b"")).unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), br#"{"RequestHeader":{"x-test":"1"}}"#);
    }

    #[test]
    fn test_get_ignores_body() {
        let response = EchoHandler
            .handle(&request(Method::GET, b"ignored"))
            .unwrap()
            .unwrap();
        let payload = EchoPayload::from_json(response.body()).unwrap();
        assert_eq!(payload.request_body, None);
    }

    #[test]
    fn test_post_echoes_body() {
        let response = EchoHandler
            .handle(&request(Method::POST, b"hello world"))
            .unwrap()
            .unwrap();
        assert_eq!(
            response.body(),
            br#"{"RequestHeader":{"x-test":"1"},"RequestBody":"hello world"}"#
        );
    }

    #[test]
    fn test_other_methods_unanswered() {
        for method in [Method::PUT, Method::DELETE, Method::HEAD, Method::PATCH, Method::OPTIONS] {
            assert!(EchoHandler.handle(&request(method, b"x")).unwrap().is_none());
        }
    }
}
