//! Signed REST access to the Bybit V5 API.

pub mod client;
pub mod demo;
pub mod endpoints;
pub mod fees;

pub use client::BybitClient;
pub use demo::DemoClient;
pub use endpoints::{Execution, MarketType, PlaceOrderParams, Side, SlTp, SlTpMode};
pub use fees::{compute_fee, FeeRate, Liquidity};
