//! [`TransitClient`]: encrypt and decrypt against a Vault transit key.

use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use common::{TransitError, TransitOperation, TransitResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::config::VaultConfig;
use crate::transit::{request, response, retry, RetryPolicy};
use crate::transport::{HyperTransport, Transport};

/// Client for the transit secrets engine.
///
/// Cheap to clone; clones share the configuration holder and the connection
/// pool. Each call loads one configuration snapshot at its start, so
/// [`TransitClient::set_token`] and [`TransitClient::update_config`] never
/// affect a call already in flight.
#[derive(Clone)]
pub struct TransitClient {
    config: Arc<ArcSwap<VaultConfig>>,
    transport: Arc<dyn Transport>,
}

impl TransitClient {
    /// Validate `config` and build a client with the production HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the TLS setup fails.
    pub fn new(config: VaultConfig) -> Result<Self> {
        config.validate()?;
        let transport = HyperTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client around an existing transport.
    pub fn with_transport(config: VaultConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            transport,
        }
    }

    /// The configuration snapshot the next call will use.
    pub fn config(&self) -> Arc<VaultConfig> {
        self.config.load_full()
    }

    /// Replace the token used by subsequent calls.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.config.rcu(|current| {
            let mut next = VaultConfig::clone(current);
            next.token = token.clone();
            next
        });
    }

    /// Replace the whole configuration used by subsequent calls.
    ///
    /// TLS settings and the connect timeout belong to the transport and are
    /// not changed by this.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the current configuration in place, if
    /// `config` is invalid.
    pub fn update_config(&self, config: VaultConfig) -> Result<()> {
        config.validate()?;
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Encrypt `plaintext` with the key `key_name`.
    ///
    /// The result payload is the ciphertext token (`vault:v<N>:...`).
    pub async fn encrypt(&self, key_name: &str, plaintext: &str) -> Result<TransitResult, TransitError> {
        self.encrypt_with_cancel(key_name, plaintext, &CancellationToken::new())
            .await
    }

    /// [`TransitClient::encrypt`], abandoning the retry wait when `cancel` fires.
    pub async fn encrypt_with_cancel(
        &self,
        key_name: &str,
        plaintext: &str,
        cancel: &CancellationToken,
    ) -> Result<TransitResult, TransitError> {
        self.call(TransitOperation::Encrypt, key_name, plaintext.as_bytes(), cancel)
            .await
    }

    /// Decrypt a ciphertext token previously issued for `key_name`.
    ///
    /// The result payload is the recovered plaintext.
    pub async fn decrypt(&self, key_name: &str, ciphertext: &str) -> Result<TransitResult, TransitError> {
        self.decrypt_with_cancel(key_name, ciphertext, &CancellationToken::new())
            .await
    }

    /// [`TransitClient::decrypt`], abandoning the retry wait when `cancel` fires.
    pub async fn decrypt_with_cancel(
        &self,
        key_name: &str,
        ciphertext: &str,
        cancel: &CancellationToken,
    ) -> Result<TransitResult, TransitError> {
        self.call(TransitOperation::Decrypt, key_name, ciphertext.as_bytes(), cancel)
            .await
    }

    async fn call(
        &self,
        op: TransitOperation,
        key_name: &str,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<TransitResult, TransitError> {
        let cfg = self.config.load_full();
        let spec = request::build(&cfg, op, key_name, payload)?;
        let policy = RetryPolicy::from_config(&cfg);

        let span = info_span!("transit", operation = %op, key = key_name);
        async move {
            debug!(max_retries = policy.max_retries, "submitting transit request");
            let delivered = retry::execute(self.transport.as_ref(), &spec, policy, cancel).await?;
            response::decode(&delivered.response, op, delivered.retries_used)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, RawResponse, RequestSpec};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn cfg() -> VaultConfig {
        VaultConfig::new("https://vault.test:8200", "s.token")
            .with_retries(2, Duration::ZERO)
    }

    fn client(transport: MockTransport) -> TransitClient {
        TransitClient::with_transport(cfg(), Arc::new(transport))
    }

    fn request_body(spec: &RequestSpec) -> Value {
        serde_json::from_slice(&spec.body).unwrap()
    }

    /// Answers like a transit engine whose "ciphertext" is the base64 input
    /// behind a version prefix.
    fn fake_engine(spec: &RequestSpec) -> RawResponse {
        let body = request_body(spec);
        let data = if spec.uri.path().contains("/encrypt/") {
            let b64 = body["plaintext"].as_str().unwrap();
            json!({"ciphertext": format!("vault:v1:{b64}")})
        } else {
            let token = body["ciphertext"].as_str().unwrap();
            json!({"plaintext": token.strip_prefix("vault:v1:").unwrap()})
        };
        let reply = json!({"lease_id": "", "renewable": false, "lease_duration": 0, "data": data});
        RawResponse::new(200, serde_json::to_vec(&reply).unwrap())
    }

    #[tokio::test]
    async fn encrypt_scenario() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .withf(|spec| {
                spec.uri.to_string() == "https://vault.test:8200/v1/transit/encrypt/orders-key"
                    && request_body(spec) == json!({"plaintext": STANDARD.encode("hello")})
                    && spec.headers.get("x-vault-token").map(|v| v == "s.token") == Some(true)
            })
            .times(1)
            .returning(|_| {
                Ok(RawResponse::new(
                    200,
                    r#"{"lease_id":"","renewable":false,"lease_duration":0,"data":{"ciphertext":"vault:v1:abcd"}}"#,
                ))
            });

        let result = client(transport).encrypt("orders-key", "hello").await.unwrap();
        assert_eq!(result.payload, "vault:v1:abcd");
        assert_eq!(result.retries_used, 0);
    }

    #[tokio::test]
    async fn round_trip_recovers_plaintext() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .returning(|spec| Ok(fake_engine(spec)));
        let client = client(transport);

        for plaintext in ["hello", "", "ünïcødé ✓", "a longer sentence with spaces"] {
            let encrypted = client.encrypt("orders-key", plaintext).await.unwrap();
            let decrypted = client.decrypt("orders-key", &encrypted.payload).await.unwrap();
            assert_eq!(decrypted.payload, plaintext);
        }
    }

    #[tokio::test]
    async fn empty_key_name_never_reaches_transport() {
        let mut transport = MockTransport::new();
        transport.expect_post().never();
        let client = client(transport);

        let err = client.encrypt("", "hello").await.unwrap_err();
        assert!(matches!(err, TransitError::InvalidArgument(_)));
        let err = client.decrypt("", "vault:v1:abcd").await.unwrap_err();
        assert!(matches!(err, TransitError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn missing_ciphertext_is_reported() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .times(1)
            .returning(|_| Ok(RawResponse::new(200, r#"{"data":{}}"#)));

        let err = client(transport).encrypt("k", "hello").await.unwrap_err();
        assert!(matches!(err, TransitError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn retries_are_counted_in_result() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_post().times(2).returning(move |spec| {
            calls += 1;
            if calls == 1 {
                Ok(RawResponse::new(503, "unavailable"))
            } else {
                Ok(fake_engine(spec))
            }
        });

        let result = client(transport).encrypt("k", "hello").await.unwrap();
        assert_eq!(result.retries_used, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempts_and_status() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .times(3)
            .returning(|_| Ok(RawResponse::new(502, "bad gateway")));

        let err = client(transport).decrypt("k", "vault:v1:abcd").await.unwrap_err();
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.status_code(), Some(502));
    }

    #[tokio::test]
    async fn set_token_applies_to_next_call() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .withf(|spec| spec.headers.get("x-vault-token").map(|v| v == "s.renewed") == Some(true))
            .times(1)
            .returning(|spec| Ok(fake_engine(spec)));
        let client = client(transport);

        client.set_token("s.renewed");
        assert_eq!(client.config().token, "s.renewed");
        client.encrypt("k", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_config_update_is_rejected() {
        let client = client(MockTransport::new());
        assert!(client
            .update_config(VaultConfig::new("not-a-url", "s.token"))
            .is_err());
        assert_eq!(client.config().addr, "https://vault.test:8200");
    }
}
