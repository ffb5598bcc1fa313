//! Shapes a transit call into a [`RequestSpec`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use common::{TransitError, TransitOperation};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Uri};

use crate::config::VaultConfig;
use crate::transport::RequestSpec;

/// Header carrying the Vault token.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("x-vault-token");

/// Header selecting a Vault Enterprise namespace.
pub const NAMESPACE_HEADER: HeaderName = HeaderName::from_static("x-vault-namespace");

/// Build the request for `op` on `key_name`.
///
/// For encrypt, `payload` is the raw plaintext and is base64-encoded. For
/// decrypt it is the ciphertext token issued by Vault and is sent verbatim.
///
/// # Errors
///
/// Returns [`TransitError::InvalidArgument`] for an unusable key name or
/// payload, or if the configured token cannot be sent as a header.
pub fn build(
    cfg: &VaultConfig,
    op: TransitOperation,
    key_name: &str,
    payload: &[u8],
) -> Result<RequestSpec, TransitError> {
    validate_key_name(key_name)?;

    let value = match op {
        TransitOperation::Encrypt => STANDARD.encode(payload),
        TransitOperation::Decrypt => {
            let token = std::str::from_utf8(payload).map_err(|_| {
                TransitError::InvalidArgument("ciphertext must be valid UTF-8".into())
            })?;
            if token.trim().is_empty() {
                return Err(TransitError::InvalidArgument(
                    "ciphertext must not be empty".into(),
                ));
            }
            token.to_owned()
        }
    };

    let mut body = serde_json::Map::new();
    body.insert(
        op.request_field_name().to_owned(),
        serde_json::Value::String(value),
    );
    let body = serde_json::to_vec(&serde_json::Value::Object(body))
        .map_err(|e| TransitError::InvalidArgument(format!("failed to encode body: {e}")))?;

    Ok(RequestSpec {
        uri: endpoint(cfg, op, key_name)?,
        headers: headers(cfg)?,
        body: Bytes::from(body),
        read_timeout: cfg.read_timeout(),
    })
}

/// `<addr>/v1/<mount>/<op>/<key>`.
fn endpoint(cfg: &VaultConfig, op: TransitOperation, key_name: &str) -> Result<Uri, TransitError> {
    let url = format!(
        "{}/v1/{}/{}/{}",
        cfg.addr.trim_end_matches('/'),
        cfg.transit_mount.trim_matches('/'),
        op.endpoint_segment(),
        key_name,
    );
    url.parse::<Uri>()
        .map_err(|e| TransitError::InvalidArgument(format!("invalid request URL {url}: {e}")))
}

fn headers(cfg: &VaultConfig) -> Result<HeaderMap, TransitError> {
    let mut headers = HeaderMap::new();

    let mut token = HeaderValue::from_str(&cfg.token).map_err(|_| {
        TransitError::InvalidArgument("token contains characters not allowed in a header".into())
    })?;
    token.set_sensitive(true);
    headers.insert(TOKEN_HEADER, token);

    if let Some(ns) = &cfg.namespace {
        let ns = HeaderValue::from_str(ns).map_err(|_| {
            TransitError::InvalidArgument(
                "namespace contains characters not allowed in a header".into(),
            )
        })?;
        headers.insert(NAMESPACE_HEADER, ns);
    }
    Ok(headers)
}

/// A key name is a single path segment.
fn validate_key_name(key_name: &str) -> Result<(), TransitError> {
    if key_name.trim().is_empty() {
        return Err(TransitError::InvalidArgument(
            "key name must not be empty".into(),
        ));
    }
    if let Some(c) = key_name
        .chars()
        .find(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(TransitError::InvalidArgument(format!(
            "key name contains disallowed character {c:?}"
        )));
    }
    Ok(())
}
