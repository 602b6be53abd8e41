//! Inbound description of the upstream call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Method used when the caller does not name one.
pub const DEFAULT_METHOD: &str = "GET";

/// A query parameter value. Only scalars are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Number(n) => write!(f, "{}", n),
            QueryValue::Text(s) => f.write_str(s),
        }
    }
}

/// The JSON body accepted on `/proxy`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyRequest {
    /// Absolute upstream URL. Required, checked by the forwarder.
    pub url: Option<String>,

    /// HTTP method, any case.
    pub method: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, String>,

    #[serde(deserialize_with = "null_as_default")]
    pub query: BTreeMap<String, QueryValue>,

    /// JSON body sent upstream.
    #[serde(alias = "data", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Upper bound for the upstream call in milliseconds; 0 disables it.
    #[serde(rename = "timeoutMs", alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProxyRequest {
    /// Decode an inbound body. An empty body is an all-defaults request.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// The upstream URL, if present and non-empty.
    pub fn target(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Upper-cased method, defaulting to GET when absent or empty.
    pub fn normalized_method(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_METHOD)
            .to_ascii_uppercase()
    }

    /// Query pairs in the form they are appended to the URL.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
