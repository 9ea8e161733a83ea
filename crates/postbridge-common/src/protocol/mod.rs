pub mod envelope;
pub mod error;
pub mod options;


pub use envelope::{generate_request_id, Envelope, RequestId};
pub use error::{BridgeError, Result};
pub use options::RequestOptions;
