//! HTTP echo server implementation
//!
//! Requests are decoded off the socket by [`codec::RequestDecoder`],
//! answered by [`EchoHandler`] and written back as JSON documents of the
//! form `{"RequestHeader": {...}, "RequestBody": "..."}`.

pub mod client;
pub mod codec;
pub mod config;
pub mod handler;
pub mod headers;
pub mod idle;
pub mod payload;
pub mod protocol;
pub mod request;
pub mod response;
pub mod server;


pub use client::{ClientConfig, ClientConfigBuilder, EchoReply, HttpEchoClient};
pub use config::{HttpConfig, DEFAULT_PORT};
pub use handler::EchoHandler;
pub use headers::{HeaderValue, RequestHeaders};
pub use payload::EchoPayload;
pub use protocol::HttpProtocolError;
pub use request::{EchoRequest, RequestFrame};
pub use response::HttpResponse;
pub use server::HttpEchoServer;
