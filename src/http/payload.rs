use super::headers::RequestHeaders;
use super::request::EchoRequest;
use crate::Result;
use serde::{Deserialize, Serialize};

/// The JSON document sent back for an echoed request
///
/// `RequestBody` is only present for POST requests; an empty POST body
/// still serializes as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoPayload {
    #[serde(rename = "RequestHeader")]
    pub request_header: RequestHeaders,
    #[serde(
        rename = "RequestBody",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_body: Option<String>,
}

impl EchoPayload {
    /// Payload carrying only the request's headers
    pub fn headers_only(request: &EchoRequest) -> Self {
        Self {
            request_header: RequestHeaders::from_raw(
                request
                    .headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_slice())),
            ),
            request_body: None,
        }
    }

    /// Payload carrying the request's headers and its body as text
    pub fn with_body(request: &EchoRequest) -> Self {
        Self {
            request_body: Some(request.body_text()),
            ..Self::headers_only(request)
        }
    }

    /// Compact JSON encoding, as written on the wire
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
