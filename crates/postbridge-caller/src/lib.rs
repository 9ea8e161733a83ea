//! Postbridge Caller
//!
//! The caller peer of the postbridge RPC bridge. It runs inside the
//! embedded, untrusted document and issues logical API calls without ever
//! holding credentials: each call travels as an `API_REQUEST` envelope to
//! the executor peer in the host document, which performs the real network
//! I/O and relays the outcome back as an `API_RESPONSE`.
//!
//! # Responsibilities
//!
//! - Connection handshake (`IFRAME_READY` → `CONNECTION_READY`)
//! - Request/response correlation through a pending-request table
//! - Per-request timeout with timeout-based abandonment
//! - Exact-match origin authentication of every inbound message
//!
//! # Example
//!
//! ```no_run
//! use postbridge_caller::{Caller, CallerConfig};
//! use postbridge_common::{realm_pair, Origin, RequestOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let embed: Origin = "https://app.example".parse()?;
//! let host: Origin = "https://host.example".parse()?;
//! let (port, _host_port) = realm_pair(embed, host.clone());
//!
//! let caller = Caller::new(port, CallerConfig::new(host));
//! caller.start().await;
//! caller.connect().await?;
//! caller.wait_connected().await;
//!
//! let matters = caller
//!     .call("api/rest/actions?page[size]=1", RequestOptions::get())
//!     .await?;
//! println!("{matters}");
//! # Ok(())
//! # }
//! ```

pub mod caller;
pub mod endpoint;

pub use caller::{Caller, CallerConfig};
