//! Request and stream authentication for the V5 API.

pub mod request;
pub mod signer;
pub mod stream;

pub use request::{timestamp_ms, RequestAuth};
pub use signer::RequestSigner;
