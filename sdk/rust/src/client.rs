use std::collections::BTreeMap;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// Description of one upstream call, serialized as the `/proxy` body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyCall {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProxyCall {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: Some(method.to_string()),
            ..Self::default()
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Status and JSON body returned by the proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub body: Value,
}

impl ProxyReply {
    /// The `error` field of a failure body, if any.
    pub fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

pub struct ProxyClient {
    client: Client,
    proxy_url: String,
    api_key: Option<String>,
}

impl ProxyClient {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_default(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Forward `call` through the proxy.
    pub async fn send(&self, call: &ProxyCall) -> Result<ProxyReply, reqwest::Error> {
        let body = serde_json::to_value(call).unwrap_or(Value::Null);
        self.send_raw(&body).await
    }

    /// Post an arbitrary JSON body to `/proxy`.
    pub async fn send_raw(&self, body: &Value) -> Result<ProxyReply, reqwest::Error> {
        let mut req = self
            .client
            .post(format!("{}/proxy", self.proxy_url))
            .json(body);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(ProxyReply { status, body })
    }
}
