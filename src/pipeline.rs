//! Per-call request pipeline.
//!
//! ```text
//! RateLimit → Auth → Decode → Forward → Respond
//! ```
//!
//! Each stage either hands over to the next or terminates the call with a
//! [`Failure`]. The limiter's window map is the only state that outlives a
//! call.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::ProxyConfig;
use crate::forward::{Failure, ForwardError, Forwarder, ProxyRequest, ProxyResponse};
use crate::observability::metrics;
use crate::security::auth::{ApiKeyAuth, AuthRejection};
use crate::security::rate_limit::{Admission, FixedWindowLimiter, RateLimitStatus};

/// Result of running one call through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub response: ProxyResponse,
    /// Limiter state, when the limiter is enabled.
    pub rate_limit: Option<RateLimitStatus>,
}

/// Guards plus forwarder, shared by every inbound call.
pub struct Pipeline {
    limiter: Option<Arc<FixedWindowLimiter>>,
    auth: ApiKeyAuth,
    forwarder: Forwarder,
}

impl Pipeline {
    pub fn new(limiter: Option<Arc<FixedWindowLimiter>>, auth: ApiKeyAuth, forwarder: Forwarder) -> Self {
        Self {
            limiter,
            auth,
            forwarder,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ForwardError> {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(FixedWindowLimiter::from_config(&config.rate_limit)));

        Ok(Self::new(
            limiter,
            ApiKeyAuth::new(config.auth.api_key.clone()),
            Forwarder::new(&config.forward)?,
        ))
    }

    pub fn limiter(&self) -> Option<&Arc<FixedWindowLimiter>> {
        self.limiter.as_ref()
    }

    /// Run one inbound call.
    ///
    /// `client` is the rate-limit identity, `headers` the inbound request
    /// headers and `body` the undecoded request body.
    pub async fn handle(&self, client: &str, headers: &HeaderMap, body: &[u8]) -> PipelineOutcome {
        let rate_limit = match &self.limiter {
            Some(limiter) => match limiter.admit(client) {
                Admission::Allowed(status) => Some(status),
                Admission::Rejected(status) => {
                    tracing::warn!(client = %client, "Rate limit exceeded");
                    metrics::record_rate_limited();
                    return PipelineOutcome {
                        response: Failure::rate_limited().into(),
                        rate_limit: Some(status),
                    };
                }
            },
            None => None,
        };

        let terminate = |failure: Failure| PipelineOutcome {
            response: failure.into(),
            rate_limit,
        };

        if let Err(rejection) = self.auth.authenticate_headers(headers) {
            tracing::warn!(client = %client, reason = rejection.as_str(), "Authentication failed");
            metrics::record_auth_failure(rejection.as_str());
            return terminate(match rejection {
                AuthRejection::Missing => Failure::api_key_missing(),
                AuthRejection::Invalid => Failure::api_key_invalid(),
            });
        }

        let request = match ProxyRequest::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting undecodable proxy request");
                return terminate(Failure::invalid_body(e.to_string()));
            }
        };

        PipelineOutcome {
            response: self.forwarder.forward(request).await,
            rate_limit,
        }
    }
}
