//! Common traits and types used across the reqecho library
//!
//! This module contains the core traits that define the interface
//! for echo servers and clients, plus helpers for spinning up
//! throwaway servers in tests.

pub mod test_utils;
pub mod traits;

pub use test_utils::{create_controlled_test_server_with_limit, spawn_test_server, TestServer};
pub use traits::{EchoClient, EchoServerTrait};
