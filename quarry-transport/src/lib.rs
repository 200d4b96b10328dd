//! Quarry Transport
//!
//! The boundary between the orchestrator and the remote service:
//! - [`Transport`]: one primitive call in, parsed JSON (or a [`TransportError`]) out
//! - [`HttpTransport`]: the reqwest implementation used in production
//! - [`RateGovernor`]: sliding-window limiter every primitive call passes through

pub mod governor;
pub mod http;
pub mod request;

pub use governor::RateGovernor;
pub use http::HttpTransport;
pub use request::{Method, Transport, TransportRequest};

pub use quarry_core::TransportError;
