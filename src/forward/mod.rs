//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! JSON body
//!     → request.rs (ProxyRequest: url, method, headers, query, body, timeout)
//!     → forwarder.rs (build + send one reqwest call, read bounded body)
//!     → error.rs (classify client errors)
//!     → response.rs (ProxyResponse: Success | Failure)
//! ```
//!
//! # Design Decisions
//! - Single attempt, no retries; the caller's timeout bounds it
//! - Upstream 4xx/5xx are relayed as responses, not errors
//! - Failures are values so no path can skip normalization

pub mod error;
pub mod forwarder;
pub mod request;
pub mod response;

pub use error::ForwardError;
pub use forwarder::Forwarder;
pub use request::{ProxyRequest, QueryValue};
pub use response::{Failure, FailureKind, ProxyResponse};
