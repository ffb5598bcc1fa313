//! Decodes a `200 OK` transit response into a [`TransitResult`].
//!
//! Lease metadata is optional and defaults when absent. The operation result
//! under `data` is required; if it is missing or mistyped the caller gets
//! [`TransitError::MalformedResponse`], never an empty result.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::TransitResponseBody;
use common::{TransitError, TransitOperation, TransitResult};

use crate::transport::RawResponse;

/// Decode `raw` as the reply to `op`.
///
/// # Errors
///
/// Returns [`TransitError::MalformedResponse`] if the status is not 200, the
/// body is not a JSON object, a metadata field has the wrong type, or
/// `data.<field>` is absent or not a string. For decrypt, the plaintext must
/// also be valid base64 of UTF-8 text.
pub fn decode(
    raw: &RawResponse,
    op: TransitOperation,
    retries_used: u32,
) -> Result<TransitResult, TransitError> {
    if raw.status != 200 {
        return Err(malformed(format!("expected HTTP 200, got {}", raw.status)));
    }

    let value: serde_json::Value = serde_json::from_slice(&raw.body)
        .map_err(|e| malformed(format!("body is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(malformed("body is not a JSON object"));
    }
    let body: TransitResponseBody = serde_json::from_value(value)
        .map_err(|e| malformed(format!("unexpected body shape: {e}")))?;

    let field = op.response_field_name();
    let data = body
        .data
        .ok_or_else(|| malformed("response has no `data` object"))?;
    let result = data
        .get(field)
        .ok_or_else(|| malformed(format!("`data.{field}` is missing")))?
        .as_str()
        .ok_or_else(|| malformed(format!("`data.{field}` is not a string")))?;

    let payload = match op {
        TransitOperation::Encrypt => result.to_owned(),
        TransitOperation::Decrypt => decode_plaintext(result)?,
    };

    Ok(TransitResult {
        lease_id: body.lease_id.unwrap_or_default(),
        renewable: body.renewable.unwrap_or(false),
        lease_duration: Duration::from_secs(body.lease_duration.unwrap_or(0)),
        payload,
        retries_used,
    })
}

fn decode_plaintext(encoded: &str) -> Result<String, TransitError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| malformed(format!("`data.plaintext` is not valid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| malformed("decrypted plaintext is not valid UTF-8"))
}

fn malformed(msg: impl Into<String>) -> TransitError {
    TransitError::MalformedResponse(msg.into())
}
