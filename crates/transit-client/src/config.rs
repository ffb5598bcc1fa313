//! Configuration loading and validation for the transit client.
//!
//! Values are read from `VAULT_*` environment variables, or assembled in code
//! with [`VaultConfig::new`] and the `with_*` setters.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Validated client configuration.
///
/// One snapshot is used for the whole of a transit call.
#[derive(Clone, Deserialize)]
pub struct VaultConfig {
    /// Base address of the Vault server, e.g. `https://vault.internal:8200`. **Required.**
    pub addr: String,

    /// Token sent in the `X-Vault-Token` header. **Required.**
    pub token: String,

    /// Vault Enterprise namespace, sent as `X-Vault-Namespace` when set.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Mount path of the transit secrets engine.
    #[serde(default = "default_transit_mount")]
    pub transit_mount: String,

    /// Retries after the first attempt. `0` means a single attempt.
    #[serde(default)]
    pub max_retries: u32,

    /// Constant delay between attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// TCP connect + TLS handshake timeout, in seconds.
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Timeout for receiving the full response, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Verify the server certificate chain and host name.
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,

    /// Path to a PEM bundle of extra trusted CA certificates (`VAULT_CACERT`).
    #[serde(default, rename = "cacert")]
    pub ca_cert_path: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_transit_mount() -> String {
    "transit".into()
}
fn default_retry_interval_ms() -> u64 {
    1000
}
fn default_open_timeout_secs() -> u64 {
    30
}
fn default_read_timeout_secs() -> u64 {
    30
}
fn default_ssl_verify() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl VaultConfig {
    /// Configuration for `addr` and `token` with every other field defaulted.
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: token.into(),
            namespace: None,
            transit_mount: default_transit_mount(),
            max_retries: 0,
            retry_interval_ms: default_retry_interval_ms(),
            open_timeout_secs: default_open_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            ssl_verify: default_ssl_verify(),
            ca_cert_path: None,
            log_level: default_log_level(),
        }
    }

    /// Load and validate configuration from `VAULT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("VAULT"))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build configuration from environment")?;

        let c: VaultConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_transit_mount(mut self, mount: impl Into<String>) -> Self {
        self.transit_mount = mount.into();
        self
    }

    /// Retry failed attempts up to `max_retries` times, waiting `interval` between them.
    pub fn with_retries(mut self, max_retries: u32, interval: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_timeouts(mut self, open: Duration, read: Duration) -> Self {
        self.open_timeout_secs = open.as_secs();
        self.read_timeout_secs = read.as_secs();
        self
    }

    pub fn with_ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    pub fn with_ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.addr, "VAULT_ADDR")?;
        ensure_non_empty(&self.token, "VAULT_TOKEN")?;

        if !(self.addr.starts_with("http://") || self.addr.starts_with("https://")) {
            anyhow::bail!("VAULT_ADDR must start with http:// or https://");
        }
        if self.transit_mount.trim_matches('/').trim().is_empty() {
            anyhow::bail!("VAULT_TRANSIT_MOUNT must not be empty");
        }
        if let Some(ns) = &self.namespace {
            ensure_non_empty(ns, "VAULT_NAMESPACE")?;
        }
        if self.open_timeout_secs == 0 {
            anyhow::bail!("VAULT_OPEN_TIMEOUT_SECS must be > 0");
        }
        if self.read_timeout_secs == 0 {
            anyhow::bail!("VAULT_READ_TIMEOUT_SECS must be > 0");
        }
        Ok(())
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token is a bearer credential.
        f.debug_struct("VaultConfig")
            .field("addr", &self.addr)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .field("transit_mount", &self.transit_mount)
            .field("max_retries", &self.max_retries)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .field("open_timeout_secs", &self.open_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("ssl_verify", &self.ssl_verify)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
