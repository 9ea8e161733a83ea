//! Postbridge Common Types and Transport
//!
//! This crate provides the core protocol definitions and the cross-realm
//! transport for the postbridge RPC bridge.
//!
//! # Overview
//!
//! Postbridge connects two isolated documents ("realms") that cannot share
//! memory or cookies: an embedded, untrusted document that wants to issue
//! API calls (the caller) and its credentialed host document that performs
//! the actual network I/O (the executor). The realms communicate only
//! through asynchronous structured messages that carry the sender's origin.
//! This crate contains everything both peers share:
//!
//! - **Protocol layer**: the four-tag message envelope, request options,
//!   request-id generation, and error handling
//! - **Transport layer**: origin identity and in-process realm ports with
//!   sender stamping and target-origin delivery rules
//!
//! # Wire format
//!
//! Envelopes are flat JSON objects discriminated by a `type` field:
//!
//! ```text
//! {"type":"API_REQUEST","requestId":"req_...","endpoint":"...","options":{...}}
//! ```
//!
//! # Components
//!
//! - [`protocol`] - Envelope, request options, errors
//! - [`transport`] - Origin identity and realm ports
//!
//! # Example
//!
//! ```
//! use postbridge_common::{Envelope, RequestOptions};
//!
//! let request = Envelope::api_request(
//!     "api/rest/actions?page[size]=1",
//!     RequestOptions::get(),
//! );
//!
//! // Every response answers exactly one request id.
//! if let Envelope::ApiRequest { request_id, .. } = &request {
//!     let response = Envelope::api_response_ok(request_id.clone(), serde_json::json!({}));
//!     assert!(matches!(response, Envelope::ApiResponse { .. }));
//! }
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{realm_pair, Delivery, Origin, RealmPort};
