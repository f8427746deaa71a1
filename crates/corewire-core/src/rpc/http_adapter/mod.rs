//! JSON-RPC transport for Bitcoin Core HTTP(S) endpoints.
//!
//! Implements [`Transport`](super::Transport) using `reqwest`, with basic or
//! cookie-file auth and optional outbound rate limiting.

mod client;
mod connection;

pub use client::{HttpTransport, HttpTransportConfig};
