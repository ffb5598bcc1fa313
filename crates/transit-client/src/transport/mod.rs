//! HTTP transport used to reach the Vault server.
//!
//! [`Transport`] is the seam between the retry loop and the network. The
//! production implementation is [`HyperTransport`]; unit tests substitute a
//! mock.

pub mod http;
pub mod tls;

pub use http::HyperTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::TransportError;
use hyper::{HeaderMap, Uri};

/// A fully shaped `POST` request, ready to hand to a [`Transport`].
///
/// The token header is marked sensitive, so `Debug` output does not reveal it.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub uri: Uri,
    pub headers: HeaderMap,
    /// JSON request body.
    pub body: Bytes,
    /// Upper bound on waiting for the response head and body.
    pub read_timeout: Duration,
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs a single `POST` exchange.
///
/// Implementations must not retry; that is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the status and body, or a transport failure.
    async fn post(&self, request: &RequestSpec) -> Result<RawResponse, TransportError>;
}
