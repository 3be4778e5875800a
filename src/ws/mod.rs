//! Realtime streaming session over WebSocket.

pub mod frame;
pub mod session;
mod transport;

pub use frame::OpFrame;
pub use session::{BybitWebSocket, MessageHandler};
