//! Postbridge Executor
//!
//! The executor peer of the postbridge RPC bridge. It runs inside the
//! credentialed host document and performs real network I/O on behalf of
//! the embedded caller, which never sees the credentials: the executor's
//! HTTP client carries the host's same-origin cookie scope implicitly.
//!
//! # Responsibilities
//!
//! - Exact-match origin authentication of every inbound message
//! - Answering the connection handshake (`IFRAME_READY` →
//!   `CONNECTION_READY`, addressed to the requesting sender)
//! - Dispatching each `API_REQUEST` to the fetch layer without blocking
//!   other inbound messages
//! - Relaying exactly one `API_RESPONSE` per request, success or failure -
//!   no local error ever escapes the executor or leaves a caller hanging
//!
//! # Components
//!
//! - [`Executor`] / [`ExecutorConfig`]: the message pump and its lifecycle
//! - [`ApiFetcher`]: the network-fetch seam, with [`HttpFetcher`] as the
//!   cookie-bearing production implementation

pub mod executor;
pub mod fetch;

pub use executor::{Executor, ExecutorConfig};
pub use fetch::{ApiFetcher, HttpFetcher};
