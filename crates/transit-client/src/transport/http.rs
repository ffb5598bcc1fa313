//! [`HyperTransport`]: pooled HTTP/1.1 client over rustls.

use std::error::Error as StdError;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use common::TransportError;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use super::{tls, RawResponse, RequestSpec, Transport};
use crate::config::VaultConfig;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Production [`Transport`] backed by a hyper connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct HyperTransport {
    client: HttpsClient,
}

impl HyperTransport {
    /// Build a transport from the TLS and timeout settings in `cfg`.
    ///
    /// The connect timeout applies to every connection the pool opens. The read
    /// timeout travels with each [`RequestSpec`].
    ///
    /// # Errors
    ///
    /// Returns an error if the CA bundle cannot be read or the TLS
    /// configuration is rejected.
    pub fn new(cfg: &VaultConfig) -> Result<Self> {
        let ca_pem = match &cfg.ca_cert_path {
            Some(path) => Some(
                std::fs::read(path).with_context(|| format!("failed to read CA bundle {path}"))?,
            ),
            None => None,
        };
        let tls_config = tls::client_config(cfg.ssl_verify, ca_pem.as_deref())?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(cfg.open_timeout()));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(https);
        debug!(
            ssl_verify = cfg.ssl_verify,
            open_timeout_secs = cfg.open_timeout_secs,
            "HTTP transport initialised"
        );
        Ok(Self { client })
    }

    async fn exchange(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(request.uri.clone())
            .body(Full::new(request.body.clone()))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let headers = req.headers_mut();
        headers.clone_from(&request.headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self.client.request(req).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(error_chain(&e))
            } else {
                TransportError::Request(error_chain(&e))
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Body(error_chain(&e)))?
            .to_bytes();

        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn post(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        let timeout: Duration = request.read_timeout;
        tokio::time::timeout(timeout, self.exchange(request))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

/// Render an error and its sources as `outer: inner: root`.
///
/// hyper's top-level errors are terse ("client error (Connect)"); the cause
/// is in the source chain.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
