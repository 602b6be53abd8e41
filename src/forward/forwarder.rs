//! Upstream call execution.
//!
//! # Responsibilities
//! - Turn a [`ProxyRequest`] into exactly one outbound `reqwest` call
//! - Treat every upstream status as a response, never as an error
//! - Bound the call by the caller's timeout and the response size limit
//! - Collapse every failure into a [`Failure`] value

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::ForwardConfig;
use crate::forward::error::ForwardError;
use crate::forward::request::ProxyRequest;
use crate::forward::response::{Failure, ProxyResponse};

/// Upstream redirects followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Executes proxied calls with a shared connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    default_timeout_ms: u64,
    max_response_bytes: usize,
}

impl Forwarder {
    pub fn new(config: &ForwardConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            client,
            default_timeout_ms: config.default_timeout_ms,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Perform the call described by `request`. Never fails; errors come
    /// back as [`ProxyResponse::Failure`].
    pub async fn forward(&self, request: ProxyRequest) -> ProxyResponse {
        let Some(target) = request.target() else {
            return Failure::missing_url().into();
        };

        match self.execute(target, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream call failed");
                e.into_failure().into()
            }
        }
    }

    async fn execute(&self, target: &str, request: &ProxyRequest) -> Result<ProxyResponse, ForwardError> {
        let start = Instant::now();
        let builder = self.build(target, request)?;

        let response = builder.send().await.map_err(ForwardError::from_send)?;
        let status = response.status();
        let headers = flatten_headers(response.headers());
        let bytes = read_body_limited(response, status, self.max_response_bytes).await?;

        tracing::debug!(
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        Ok(ProxyResponse::Success {
            status,
            headers,
            body: decode_body(&bytes),
        })
    }

    fn build(&self, target: &str, request: &ProxyRequest) -> Result<reqwest::RequestBuilder, ForwardError> {
        let mut url = Url::parse(target)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ForwardError::UnsupportedScheme(url.scheme().to_string()));
        }

        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let method_name = request.normalized_method();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| ForwardError::InvalidMethod(method_name.clone()))?;

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let invalid = || ForwardError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.append(header_name, header_value);
        }

        tracing::debug!(
            method = %method,
            host = url.host_str().unwrap_or(""),
            path = url.path(),
            "Dispatching upstream request"
        );

        let mut builder = self.client.request(method, url).headers(headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout_ms = request.timeout_ms.unwrap_or(self.default_timeout_ms);
        if timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(builder)
    }
}

/// Collapse a header map into name → value, joining repeated names.
fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

/// JSON when the body parses as JSON, otherwise the raw text.
fn decode_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Read the upstream body, refusing anything past `limit` bytes.
async fn read_body_limited(
    mut response: reqwest::Response,
    status: StatusCode,
    limit: usize,
) -> Result<Vec<u8>, ForwardError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            tracing::warn!(content_length = len, limit, "Upstream response exceeds size limit");
            return Err(ForwardError::TooLarge {
                status,
                limit,
                partial: None,
            });
        }
    }

    let mut buf = Vec::with_capacity(
        response
            .content_length()
            .map(|len| len as usize)
            .unwrap_or(8192)
            .min(limit),
    );

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                let partial = (!buf.is_empty()).then(|| decode_body(&buf));
                return Err(ForwardError::from_body(status, partial, e));
            }
        };

        if buf.len() + chunk.len() > limit {
            tracing::warn!(limit, "Upstream response exceeds size limit while streaming");
            return Err(ForwardError::TooLarge {
                status,
                limit,
                partial: None,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}
