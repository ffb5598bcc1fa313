//! Common types, wire definitions, and errors shared across `vault-transit` crates.

pub mod error;
pub mod protocol;

pub use error::{AttemptError, TransitError, TransportError};
pub use protocol::{TransitOperation, TransitResult};
