use bytes::BytesMut;
use proptest::prelude::*;
use reqecho::common::create_controlled_test_server_with_limit;
use reqecho::http::codec::RequestDecoder;
use reqecho::http::{EchoPayload, HeaderValue, HttpEchoClient, RequestFrame};
use reqecho::ResourceLimits;
use std::time::Duration;
use tokio_util::codec::Decoder;

/// Feeds `raw` to a fresh decoder in the given piece sizes and collects the requests
fn decode_in_pieces(raw: &[u8], pieces: &[usize]) -> Vec<reqecho::EchoRequest> {
    let mut decoder = RequestDecoder::new(ResourceLimits::default());
    let mut buffer = BytesMut::new();
    let mut requests = Vec::new();
    let mut offset = 0;
    let mut sizes = pieces.iter().copied().cycle();

    while offset < raw.len() {
        let size = sizes.next().unwrap_or(1).max(1).min(raw.len() - offset);
        buffer.extend_from_slice(&raw[offset..offset + size]);
        offset += size;
        while let Some(frame) = decoder.decode(&mut buffer).unwrap() {
            if let RequestFrame::Request(request) = frame {
                requests.push(request);
            }
        }
    }
    requests
}

fn header_name() -> impl Strategy<Value = String> {
    "x-[a-z0-9]{1,12}"
}

fn header_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._/=-]{0,24}".prop_map(|v| v.trim().to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: how the bytes are split across reads never changes the decoded body
    #[test]
    fn fragmentation_is_transparent(
        body in prop::collection::vec(any::<u8>(), 0..2048),
        pieces in prop::collection::vec(1usize..64, 1..8),
        chunked in any::<bool>(),
    ) {
        let mut raw = b"POST / HTTP/1.1\r\nHost: localhost\r\n".to_vec();
        if chunked {
            raw.extend_from_slice(b"Transfer-Encoding: chunked\r\n\r\n");
            for chunk in body.chunks(100) {
                raw.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                raw.extend_from_slice(chunk);
                raw.extend_from_slice(b"\r\n");
            }
            raw.extend_from_slice(b"0\r\n\r\n");
        } else {
            raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
            raw.extend_from_slice(&body);
        }

        let whole = decode_in_pieces(&raw, &[raw.len()]);
        let split = decode_in_pieces(&raw, &pieces);

        prop_assert_eq!(whole.len(), 1);
        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(&whole[0].body[..], &body[..]);
    }

    /// Property: any set of distinct headers is reflected back under lowercased names
    #[test]
    fn headers_are_reflected(
        headers in prop::collection::btree_map(header_name(), header_value(), 0..12),
    ) {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for (name, value) in &headers {
            raw.push_str(&format!("{}: {}\r\n", name.to_uppercase(), value));
        }
        raw.push_str("\r\n");

        let requests = decode_in_pieces(raw.as_bytes(), &[7]);
        prop_assert_eq!(requests.len(), 1);

        let payload = EchoPayload::headers_only(&requests[0]);
        prop_assert_eq!(payload.request_header.len(), headers.len());
        for (name, value) in &headers {
            prop_assert_eq!(payload.request_header.get(name), Some(&HeaderValue::from(value.as_str())));
        }
        prop_assert!(payload.request_body.is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: a POSTed string comes back unchanged, whether sent whole or in pieces
    #[test]
    fn post_body_round_trips(text in ".{0,512}", pieces in 1usize..5) {
        tokio_test::block_on(async {
            let server = create_controlled_test_server_with_limit(10).await
                .map_err(|e| TestCaseError::fail(format!("Server setup failed: {}", e)))?;

            let mut client = HttpEchoClient::connect(server.addr).await
                .map_err(|e| TestCaseError::fail(format!("Client connection failed: {}", e)))?;

            let whole = client.post(&[("X-Case", "whole")], text.as_bytes()).await
                .map_err(|e| TestCaseError::fail(format!("Post failed: {}", e)))?;
            let split = client
                .post_fragmented(&[("X-Case", "split")], text.as_bytes(), pieces, Duration::from_millis(1))
                .await
                .map_err(|e| TestCaseError::fail(format!("Fragmented post failed: {}", e)))?;

            // Clean shutdown
            server.shutdown().await
                .map_err(|e| TestCaseError::fail(format!("Shutdown failed: {}", e)))?;

            for reply in [whole, split] {
                let content_length: usize = reply.header("content-length").unwrap_or("0").parse().unwrap();
                prop_assert_eq!(content_length, reply.body.len());

                let payload = reply.payload()
                    .map_err(|e| TestCaseError::fail(format!("Invalid payload: {}", e)))?;
                prop_assert_eq!(payload.request_body.as_deref(), Some(text.as_str()));
            }
            Ok(())
        })?;
    }
}
