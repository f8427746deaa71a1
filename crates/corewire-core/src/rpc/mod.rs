//! The transport seam and the async client that drives a call end to end.
//!
//! [`Transport`] moves an [`EncodedRequest`] over the wire and hands back
//! the raw status and body; [`Client`] owns everything else (ids, encoding,
//! classification, decoding and retries). [`HttpTransport`] is the
//! production implementation and `mock::MockTransport` the test double.

mod client;
mod http_adapter;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{CallOptions, Client, RetryPolicy};
pub use http_adapter::{HttpTransport, HttpTransportConfig};

use std::sync::Arc;

use async_trait::async_trait;

use crate::classify::ResponseBody;
use crate::encode::EncodedRequest;
use crate::error::TransportError;

/// What came back over the wire, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// Posts one encoded request and returns whatever the server answered.
///
/// Implementations return `Err` only when no HTTP response was received
/// (timeouts, refused connections). Non-200 statuses are data, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &EncodedRequest) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &EncodedRequest) -> Result<RawResponse, TransportError> {
        (**self).execute(request).await
    }
}
