//! Authenticated, rate-limited HTTP forwarding proxy.
//!
//! A caller POSTs (or sends with any method) a JSON description of an
//! upstream call to `/proxy`; the proxy performs it once and relays the
//! upstream status, headers and body, or a normalized error.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, PipelineOutcome};
