//! HTTP/1.x request framing
//!
//! [`RequestDecoder`] turns a byte stream into complete requests. It is
//! meant to sit under a `FramedRead`, which keeps feeding it whatever
//! arrives on the socket; a body split across any number of reads
//! decodes the same as one sent in a single write.

use super::protocol::HttpProtocolError;
use super::request::{expects_continue, EchoRequest, RequestFrame};
use crate::security::{ResourceLimits, SizeValidator};
use bytes::{Buf, BytesMut};
use http::{Method, Version};
use tokio_util::codec::Decoder;

/// Longest chunk-size or trailer line accepted
const MAX_LINE_LENGTH: usize = 4096;

/// Decoder for pipelined HTTP/1.x requests
#[derive(Debug)]
pub struct RequestDecoder {
    limits: ResourceLimits,
    state: DecodeState,
    // Bytes of a partial head already searched for the terminating blank line
    head_scanned: usize,
}

#[derive(Debug)]
enum DecodeState {
    Head,
    Body {
        head: RequestHead,
        framing: BodyFraming,
        body: BytesMut,
    },
}

#[derive(Debug)]
struct RequestHead {
    method: Method,
    target: String,
    version: Version,
    headers: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    /// Bytes still expected under `Content-Length`
    Length(usize),
    Chunked(ChunkState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(usize),
    DataEnd,
    Trailers,
}

impl RequestDecoder {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            state: DecodeState::Head,
            head_scanned: 0,
        }
    }

    /// Whether the blank line ending the head has arrived
    ///
    /// Resumes where the previous call stopped, so a head trickling in is
    /// searched once rather than re-parsed on every read.
    fn head_complete(&mut self, src: &[u8]) -> bool {
        let start = self.head_scanned.saturating_sub(2).min(src.len());
        let found = (start..src.len()).any(|i| {
            src[i] == b'\n' && matches!(&src[i + 1..], [b'\n', ..] | [b'\r', b'\n', ..])
        });
        self.head_scanned = if found { 0 } else { src.len() };
        found
    }

    fn decode_head(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<(RequestHead, BodyFraming)>, HttpProtocolError> {
        // Stray line breaks between pipelined requests are tolerated
        while src.starts_with(b"\r\n") || src.starts_with(b"\n") {
            let n = if src[0] == b'\r' { 2 } else { 1 };
            src.advance(n);
            self.head_scanned = 0;
        }
        if src.is_empty() {
            return Ok(None);
        }

        let head_limit = SizeValidator::new(self.limits.max_head_size);
        if !self.head_complete(src) {
            head_limit
                .validate_size(src.len())
                .map_err(HttpProtocolError::HeadTooLarge)?;
            return Ok(None);
        }

        let mut headers = vec![httparse::EMPTY_HEADER; self.limits.max_headers];
        let mut req = httparse::Request::new(&mut headers);

        let head_len = match req.parse(&src[..]) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => {
                head_limit
                    .validate_size(src.len())
                    .map_err(HttpProtocolError::HeadTooLarge)?;
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => {
                return Err(HttpProtocolError::TooManyHeaders {
                    max: self.limits.max_headers,
                });
            }
            Err(e) => return Err(e.into()),
        };
        head_limit
            .validate_size(head_len)
            .map_err(HttpProtocolError::HeadTooLarge)?;

        let method = req.method.unwrap_or_default();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| HttpProtocolError::InvalidRequest(format!("Invalid method {method:?}")))?;
        let version = match req.version {
            Some(0) => Version::HTTP_10,
            _ => Version::HTTP_11,
        };
        let target = req.path.unwrap_or("/").to_string();
        let headers: Vec<(String, Vec<u8>)> = req
            .headers
            .iter()
            .map(|h| (h.name.to_string(), h.value.to_vec()))
            .collect();

        src.advance(head_len);

        let framing = body_framing(&headers, &self.limits)?;
        Ok(Some((
            RequestHead {
                method,
                target,
                version,
                headers,
            },
            framing,
        )))
    }
}

impl Decoder for RequestDecoder {
    type Item = RequestFrame;
    type Error = HttpProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::Head => {
                    let Some((head, framing)) = self.decode_head(src)? else {
                        return Ok(None);
                    };
                    let wants_continue = framing != BodyFraming::Length(0)
                        && expects_continue(head.version, &head.headers);
                    self.state = DecodeState::Body {
                        head,
                        framing,
                        body: BytesMut::new(),
                    };
                    if wants_continue {
                        return Ok(Some(RequestFrame::Continue));
                    }
                }
                DecodeState::Body {
                    ref mut framing,
                    ref mut body,
                    ..
                } => {
                    let body_limit = SizeValidator::new(self.limits.max_body_size);
                    if !advance_body(framing, body, src, &body_limit)? {
                        return Ok(None);
                    }
                    let DecodeState::Body { head, body, .. } =
                        std::mem::replace(&mut self.state, DecodeState::Head)
                    else {
                        unreachable!("decoder state checked above");
                    };
                    return Ok(Some(RequestFrame::Request(EchoRequest {
                        method: head.method,
                        target: head.target,
                        version: head.version,
                        headers: head.headers,
                        body: body.freeze(),
                    })));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && matches!(self.state, DecodeState::Head) => Ok(None),
            None => Err(HttpProtocolError::IncompleteRequest),
        }
    }
}

/// Works out how the body of a request is delimited
fn body_framing(
    headers: &[(String, Vec<u8>)],
    limits: &ResourceLimits,
) -> Result<BodyFraming, HttpProtocolError> {
    let values = |name: &'static str| {
        headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.split(|&b| b == b','))
            .map(<[u8]>::trim_ascii)
            .filter(|token| !token.is_empty())
    };

    let codings: Vec<&[u8]> = values("transfer-encoding").collect();
    let lengths: Vec<&[u8]> = values("content-length").collect();

    if let Some(last) = codings.last() {
        if !lengths.is_empty() {
            return Err(HttpProtocolError::InvalidRequest(
                "Both Transfer-Encoding and Content-Length present".to_string(),
            ));
        }
        if !last.eq_ignore_ascii_case(b"chunked") {
            return Err(HttpProtocolError::InvalidRequest(format!(
                "Unsupported transfer encoding {:?}",
                String::from_utf8_lossy(last)
            )));
        }
        return Ok(BodyFraming::Chunked(ChunkState::Size));
    }

    let mut length = None;
    for token in lengths {
        let parsed = parse_content_length(token).ok_or_else(|| {
            HttpProtocolError::InvalidRequest(format!(
                "Invalid Content-Length {:?}",
                String::from_utf8_lossy(token)
            ))
        })?;
        match length {
            Some(previous) if previous != parsed => {
                return Err(HttpProtocolError::InvalidRequest(
                    "Conflicting Content-Length values".to_string(),
                ));
            }
            _ => length = Some(parsed),
        }
    }

    let length = length.unwrap_or(0);
    SizeValidator::new(limits.max_body_size)
        .validate_size(length)
        .map_err(HttpProtocolError::BodyTooLarge)?;
    Ok(BodyFraming::Length(length))
}

fn parse_content_length(token: &[u8]) -> Option<usize> {
    if !token.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(token).ok()?.parse().ok()
}

/// Moves body bytes from `src` into `body`; true once the body is complete
fn advance_body(
    framing: &mut BodyFraming,
    body: &mut BytesMut,
    src: &mut BytesMut,
    limit: &SizeValidator,
) -> Result<bool, HttpProtocolError> {
    loop {
        match framing {
            BodyFraming::Length(remaining) => {
                let take = (*remaining).min(src.len());
                body.extend_from_slice(&src[..take]);
                src.advance(take);
                *remaining -= take;
                return Ok(*remaining == 0);
            }
            BodyFraming::Chunked(state) => match *state {
                ChunkState::Size => {
                    let Some(line) = take_line(src)? else {
                        return Ok(false);
                    };
                    let size = parse_chunk_size(&line)?;
                    limit
                        .validate_size(body.len().saturating_add(size))
                        .map_err(HttpProtocolError::BodyTooLarge)?;
                    *state = if size == 0 {
                        ChunkState::Trailers
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(false);
                    }
                    let take = remaining.min(src.len());
                    body.extend_from_slice(&src[..take]);
                    src.advance(take);
                    *state = if take == remaining {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - take)
                    };
                }
                ChunkState::DataEnd => {
                    if src.len() < 2 {
                        return Ok(false);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(HttpProtocolError::InvalidRequest(
                            "Missing CRLF after chunk data".to_string(),
                        ));
                    }
                    src.advance(2);
                    *state = ChunkState::Size;
                }
                ChunkState::Trailers => {
                    // Trailer fields are read and dropped
                    let Some(line) = take_line(src)? else {
                        return Ok(false);
                    };
                    if line.is_empty() {
                        return Ok(true);
                    }
                }
            },
        }
    }
}

/// Splits one line off `src`, without its line ending
fn take_line(src: &mut BytesMut) -> Result<Option<BytesMut>, HttpProtocolError> {
    let Some(pos) = src.iter().position(|&b| b == b'\n') else {
        if src.len() > MAX_LINE_LENGTH {
            return Err(HttpProtocolError::InvalidRequest(
                "Chunk line too long".to_string(),
            ));
        }
        return Ok(None);
    };

    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }
    Ok(Some(line))
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, HttpProtocolError> {
    let invalid = || {
        HttpProtocolError::InvalidRequest(format!(
            "Invalid chunk size line {:?}",
            String::from_utf8_lossy(line)
        ))
    };

    // Extensions after ';' are ignored
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = size.trim_ascii_end();
    if size.is_empty() || !size.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }
    let size = std::str::from_utf8(size).map_err(|_| invalid())?;
    usize::from_str_radix(size, 16).map_err(|_| invalid())
}
