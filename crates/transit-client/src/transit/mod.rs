//! The transit call pipeline: build, execute with retry, decode.
//!
//! # Module invariants
//!
//! - **No I/O before validation.** [`request::build`] rejects bad input before
//!   anything reaches the transport.
//! - **The actual operation is threaded through.** The same
//!   [`common::TransitOperation`] drives the request path, the body field and
//!   the response field.
//! - **No token or payload in logs.**

pub mod request;
pub mod response;
pub mod retry;

pub use retry::RetryPolicy;
