use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Transport options attached to one API request.
///
/// Every field is optional on the wire; the executor fills in defaults
/// (GET, JSON content-type/accept headers) when issuing the network call.
/// Caller-supplied headers win over the defaults on conflict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestOptions {
    /// Options for a plain GET request.
    pub fn get() -> Self {
        Self::default().with_method("GET")
    }

    /// Options for a POST request carrying the given body.
    pub fn post(body: Value) -> Self {
        Self::default().with_method("POST").with_body(body)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}
