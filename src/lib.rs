//! Bybit V5 API client.
//!
//! Provides signed REST access and an authenticated realtime WebSocket
//! session. Requests are signed over a canonical payload with either
//! HMAC-SHA256 or RSA-SHA256 depending on the configured key type.
//!
//! ```no_run
//! use bybitx::{BybitClient, BybitConfig, Params};
//!
//! # async fn example() -> Result<(), bybitx::BybitError> {
//! let config = BybitConfig::from_env()?;
//! let client = BybitClient::new(config)?;
//! let tickers = client
//!     .get_tickers(&Params::new().with("category", "spot").with("symbol", "BTCUSDT"))
//!     .await?;
//! println!("{tickers}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod core;
pub mod rest;
pub mod ws;

pub use crate::core::config::{BybitConfig, Region, SigningScheme};
pub use crate::core::errors::BybitError;
pub use crate::core::params::{ParamValue, Params};
pub use auth::{RequestAuth, RequestSigner};
pub use rest::{
    BybitClient, DemoClient, Execution, MarketType, PlaceOrderParams, Side, SlTp, SlTpMode,
};
pub use ws::{BybitWebSocket, MessageHandler, OpFrame};
