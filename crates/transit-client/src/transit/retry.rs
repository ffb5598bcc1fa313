//! Bounded, constant-delay retry around a [`Transport`].
//!
//! Every transport error and every status other than 200 is retryable. After
//! `max_retries` retries the last failure is returned inside
//! [`TransitError::OperationFailed`].

use std::time::Duration;

use common::protocol::VaultErrorBody;
use common::{AttemptError, TransitError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::VaultConfig;
use crate::transport::{RawResponse, RequestSpec, Transport};

/// Retry bound and delay for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant delay before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &VaultConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            delay: cfg.retry_interval(),
        }
    }
}

/// A `200 OK` response and the number of retries it took.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub response: RawResponse,
    pub retries_used: u32,
}

/// Send `spec` until it succeeds or the policy is exhausted.
///
/// Attempts are strictly sequential. Cancelling `cancel` while waiting
/// between attempts aborts with [`TransitError::Cancelled`].
///
/// # Errors
///
/// [`TransitError::OperationFailed`] after `policy.max_retries + 1` failed
/// attempts, or [`TransitError::Cancelled`].
pub async fn execute(
    transport: &dyn Transport,
    spec: &RequestSpec,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Delivered, TransitError> {
    let mut retries_used: u32 = 0;

    loop {
        let attempt = retries_used + 1;

        let failure = match transport.post(spec).await {
            Ok(response) if response.status == 200 => {
                debug!(attempt, "transit request succeeded");
                return Ok(Delivered {
                    response,
                    retries_used,
                });
            }
            Ok(response) => AttemptError::Service {
                status: response.status,
                body: VaultErrorBody::describe(&response.body),
            },
            Err(e) => AttemptError::Transport(e),
        };

        if retries_used >= policy.max_retries {
            warn!(attempts = attempt, error = %failure, "transit request failed; no retries left");
            return Err(TransitError::OperationFailed {
                attempts: attempt,
                source: failure,
            });
        }

        warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms = policy.delay.as_millis() as u64,
            error = %failure,
            "transit request failed; retrying"
        );
        retries_used += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempts = attempt, "retry wait cancelled");
                return Err(TransitError::Cancelled { attempts: attempt });
            }
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use common::TransportError;
    use hyper::HeaderMap;

    fn spec() -> RequestSpec {
        RequestSpec {
            uri: "http://vault.test/v1/transit/encrypt/k".parse().unwrap(),
            headers: HeaderMap::new(),
            body: bytes::Bytes::from_static(br#"{"plaintext":"eA=="}"#),
            read_timeout: Duration::from_secs(5),
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    fn refused() -> TransportError {
        TransportError::Connect("connection refused".into())
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .times(1)
            .returning(|_| Ok(RawResponse::new(200, "{}")));

        let out = execute(&transport, &spec(), policy(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.retries_used, 0);
        assert_eq!(out.response.status, 200);
    }

    #[tokio::test]
    async fn always_failing_transport_makes_n_plus_one_attempts() {
        let mut transport = MockTransport::new();
        transport.expect_post().times(4).returning(|_| Err(refused()));

        let err = execute(&transport, &spec(), policy(3), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            TransitError::OperationFailed { attempts, source } => {
                assert_eq!(attempts, 4);
                assert!(matches!(source, AttemptError::Transport(TransportError::Connect(_))));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let mut transport = MockTransport::new();
        transport
            .expect_post()
            .times(1)
            .returning(|_| Ok(RawResponse::new(500, "boom")));

        let err = execute(&transport, &spec(), policy(0), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn service_error_then_success() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_post().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(RawResponse::new(503, r#"{"errors":["Vault is sealed"]}"#))
            } else {
                Ok(RawResponse::new(200, "{}"))
            }
        });

        let out = execute(&transport, &spec(), policy(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.retries_used, 1);
    }

    #[tokio::test]
    async fn last_failure_is_reported() {
        let mut transport = MockTransport::new();
        let mut calls = 0;
        transport.expect_post().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(refused())
            } else {
                Ok(RawResponse::new(403, r#"{"errors":["permission denied"]}"#))
            }
        });

        let err = execute(&transport, &spec(), policy(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_constant_between_attempts() {
        let mut transport = MockTransport::new();
        transport.expect_post().times(4).returning(|_| Err(refused()));

        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(500),
        };
        let start = tokio::time::Instant::now();
        let _ = execute(&transport, &spec(), policy, &CancellationToken::new()).await;
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn cancellation_during_wait_aborts() {
        let mut transport = MockTransport::new();
        transport.expect_post().times(1).returning(|_| Err(refused()));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let policy = RetryPolicy {
            max_retries: 5,
            delay: Duration::from_secs(3600),
        };
        let err = execute(&transport, &spec(), policy, &cancel).await.unwrap_err();
        assert!(matches!(err, TransitError::Cancelled { attempts: 1 }));
    }
}
