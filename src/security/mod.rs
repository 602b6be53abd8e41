//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client identity)
//!     → auth.rs (x-api-key against the shared secret)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any guard failure
//! - The limiter runs first, so unauthenticated floods are throttled too
//! - The secret never reaches a log line

pub mod auth;
pub mod rate_limit;

pub use auth::{ApiKeyAuth, AuthRejection, X_API_KEY};
pub use rate_limit::{Admission, Clock, FixedWindowLimiter, RateLimitStatus, SystemClock};
