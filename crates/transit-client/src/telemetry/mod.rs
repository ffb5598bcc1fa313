//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary.
//!
//! # Telemetry invariants
//!
//! - **No token or payload** may appear in any span attribute or log field.
//! - Log level is configurable via `VAULT_LOG_LEVEL` (default: `info`) and
//!   overridden by `RUST_LOG` when set.

pub mod init;

pub use init::{init, LogFormat};
