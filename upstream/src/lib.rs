//! Access to the upstream gradebook service.
//!
//! The [`client::Gradebook`] trait is the capability surface the gateway
//! consumes. [`session::Session`] owns the single authenticated handle and
//! implements the one-shot re-login retry.

pub mod client;
pub mod errors;
pub mod http_client;
mod metrics_defs;
pub mod session;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use client::{Capabilities, DateRange, Gradebook, Operation};
pub use errors::UpstreamError;
pub use metrics_defs::ALL_METRICS;
pub use session::{Credentials, Session};
