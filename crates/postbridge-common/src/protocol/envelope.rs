use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::options::RequestOptions;

/// Correlation token for one in-flight call.
///
/// Identifiers are strings on the wire and are unique for the lifetime of
/// the issuing process; see [`generate_request_id`].
pub type RequestId = String;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One cross-realm message.
///
/// This is a closed tagged union: receivers act only on these four tags and
/// silently discard anything that does not deserialize into one of them
/// with all required fields present. On the wire an envelope is a flat JSON
/// object discriminated by its `type` field.
///
/// # Directions
///
/// - [`IframeReady`](Envelope::IframeReady): caller → executor (handshake)
/// - [`ConnectionReady`](Envelope::ConnectionReady): executor → caller
/// - [`ApiRequest`](Envelope::ApiRequest): caller → executor
/// - [`ApiResponse`](Envelope::ApiResponse): executor → caller
///
/// # Example
///
/// ```
/// use postbridge_common::Envelope;
///
/// let ready: Envelope = serde_json::from_str(r#"{"type":"CONNECTION_READY"}"#).unwrap();
/// assert_eq!(ready, Envelope::ConnectionReady);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Handshake request: the caller announces it is listening.
    #[serde(rename = "IFRAME_READY")]
    IframeReady,

    /// Handshake confirmation: the executor is installed and reachable.
    #[serde(rename = "CONNECTION_READY")]
    ConnectionReady,

    /// A logical API call the executor should perform on the caller's behalf.
    #[serde(rename = "API_REQUEST")]
    ApiRequest {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Opaque operation identifier: a path (plus query), or an absolute URL.
        endpoint: String,
        #[serde(default)]
        options: RequestOptions,
    },

    /// The outcome of one [`ApiRequest`](Envelope::ApiRequest), carrying
    /// either decoded data or an error description - never both.
    #[serde(rename = "API_RESPONSE")]
    ApiResponse {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Envelope {
    /// Builds an [`ApiRequest`](Envelope::ApiRequest) with a freshly
    /// generated request id.
    pub fn api_request(endpoint: impl Into<String>, options: RequestOptions) -> Self {
        Envelope::ApiRequest {
            request_id: generate_request_id(),
            endpoint: endpoint.into(),
            options,
        }
    }

    /// Builds a successful [`ApiResponse`](Envelope::ApiResponse).
    ///
    /// # Example
    ///
    /// ```
    /// use postbridge_common::Envelope;
    /// use serde_json::json;
    ///
    /// let response = Envelope::api_response_ok("req_1".into(), json!({"actions": []}));
    /// if let Envelope::ApiResponse { data, error, .. } = response {
    ///     assert_eq!(data, Some(json!({"actions": []})));
    ///     assert!(error.is_none());
    /// }
    /// ```
    pub fn api_response_ok(request_id: RequestId, data: Value) -> Self {
        Envelope::ApiResponse {
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Builds a failed [`ApiResponse`](Envelope::ApiResponse) carrying an
    /// error description instead of data.
    pub fn api_response_err(request_id: RequestId, error: impl Into<String>) -> Self {
        Envelope::ApiResponse {
            request_id,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Generates a request id unique for the lifetime of this process.
///
/// Combines a millisecond timestamp with a process-wide counter; the counter
/// alone already guarantees uniqueness, the timestamp keeps ids readable and
/// roughly sortable in logs.
pub fn generate_request_id() -> RequestId {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let counter = REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst);

    format!("req_{}_{}", millis, counter)
}
