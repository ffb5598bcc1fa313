//! Client for the Vault transit secrets engine.
//!
//! A call flows through four stages:
//! 1. [`transit::request::build`] validates the key name and shapes the
//!    `POST /v1/<mount>/{encrypt|decrypt}/<key>` request.
//! 2. [`transit::retry::execute`] submits it through a [`Transport`], retrying
//!    transient failures with a constant delay.
//! 3. [`transit::response::decode`] extracts lease metadata and the
//!    operation result from the `200 OK` body.
//! 4. [`TransitClient`] ties the stages together behind `encrypt` / `decrypt`.

pub mod client;
pub mod config;
pub mod telemetry;
pub mod transit;
pub mod transport;

pub use client::TransitClient;
pub use common::{AttemptError, TransitError, TransitOperation, TransitResult, TransportError};
pub use config::VaultConfig;
pub use transport::{HyperTransport, RawResponse, RequestSpec, Transport};
