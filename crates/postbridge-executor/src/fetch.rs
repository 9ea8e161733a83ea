use std::str::FromStr;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;

use postbridge_common::protocol::{BridgeError, RequestOptions, Result};
use postbridge_common::transport::Origin;

/// The network-fetch capability behind the executor.
///
/// Object-safe so the executor can hold `Arc<dyn ApiFetcher>`; tests
/// substitute mock implementations for the real HTTP client.
#[async_trait]
pub trait ApiFetcher: Send + Sync {
    /// Performs one request against a fully-qualified URL and decodes the
    /// response body as JSON.
    ///
    /// Implementations must report non-success outcomes as errors; the
    /// executor converts every error into the response envelope's error
    /// branch.
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Value>;
}

/// Production fetcher backed by reqwest.
///
/// The cookie store is enabled so the host's session travels implicitly
/// with same-origin requests; no explicit token handling happens anywhere
/// in the bridge. Requests default to JSON content-type/accept headers,
/// with caller-supplied headers winning on conflict.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| BridgeError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ApiFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Value> {
        let method = parse_method(options.method.as_deref())?;
        let headers = merged_headers(options)?;

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body_text(body)?);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BridgeError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Http(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BridgeError::Http(format!("failed to decode response body: {e}")))
    }
}

/// Resolves an endpoint to a fully-qualified target: absolute http(s) URLs
/// pass through untouched, anything else is resolved against the API base.
pub fn resolve_target(api_base: &Origin, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("{}/{}", api_base, endpoint.trim_start_matches('/'))
    }
}

fn parse_method(method: Option<&str>) -> Result<Method> {
    match method {
        None => Ok(Method::GET),
        Some(name) => Method::from_str(&name.to_ascii_uppercase())
            .map_err(|_| BridgeError::InvalidRequest(format!("unknown HTTP method: {name}"))),
    }
}

fn merged_headers(options: &RequestOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &options.headers {
        let header_name = HeaderName::from_str(name)
            .map_err(|_| BridgeError::InvalidRequest(format!("invalid header name: {name}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| BridgeError::InvalidRequest(format!("invalid value for header {name}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// String bodies go out raw; any other JSON value is serialized to its
/// JSON text.
fn body_text(body: &Value) -> Result<String> {
    match body {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}
