//! Transit operation descriptors and the JSON shapes exchanged with Vault.
//!
//! Request bodies are a single flat object keyed by
//! [`TransitOperation::request_field_name`]; responses carry optional lease
//! metadata at the top level and the operation result under `data`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::TransitError;

// ---------------------------------------------------------------------------
// Operation descriptor
// ---------------------------------------------------------------------------

/// A transit engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitOperation {
    Encrypt,
    Decrypt,
}

impl TransitOperation {
    /// Path segment after `/v1/<mount>/`.
    pub fn endpoint_segment(self) -> &'static str {
        match self {
            TransitOperation::Encrypt => "encrypt",
            TransitOperation::Decrypt => "decrypt",
        }
    }

    /// Name of the single field in the request body.
    pub fn request_field_name(self) -> &'static str {
        match self {
            TransitOperation::Encrypt => "plaintext",
            TransitOperation::Decrypt => "ciphertext",
        }
    }

    /// Name of the field read from the response `data` object.
    pub fn response_field_name(self) -> &'static str {
        match self {
            TransitOperation::Encrypt => "ciphertext",
            TransitOperation::Decrypt => "plaintext",
        }
    }
}

impl fmt::Display for TransitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint_segment())
    }
}

impl FromStr for TransitOperation {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "encrypt" => Ok(TransitOperation::Encrypt),
            "decrypt" => Ok(TransitOperation::Decrypt),
            other => Err(TransitError::InvalidArgument(format!(
                "unknown transit operation: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Body of a `200 OK` transit response.
///
/// Lease fields are optional; not every transit response issues a lease.
/// `data` is kept as a raw map because the field inside it depends on the
/// operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitResponseBody {
    #[serde(default)]
    pub lease_id: Option<String>,
    #[serde(default)]
    pub renewable: Option<bool>,
    /// Lease duration in seconds.
    #[serde(default)]
    pub lease_duration: Option<u64>,
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Body Vault returns alongside a non-2xx status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl VaultErrorBody {
    /// Render a diagnostic message from a raw error body.
    ///
    /// Uses the joined `errors` list when the body has one, otherwise the body
    /// text itself.
    pub fn describe(body: &[u8]) -> String {
        match serde_json::from_slice::<VaultErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
            _ => String::from_utf8_lossy(body).trim().to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded result
// ---------------------------------------------------------------------------

/// Decoded outcome of a successful transit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitResult {
    /// Lease identifier; empty when the service issued no lease.
    pub lease_id: String,
    pub renewable: bool,
    pub lease_duration: Duration,
    /// Ciphertext token for encrypt, recovered plaintext for decrypt.
    pub payload: String,
    /// Attempts beyond the first that were needed to succeed.
    pub retries_used: u32,
}
