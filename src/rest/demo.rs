use crate::core::config::BybitConfig;
use crate::core::errors::BybitError;
use crate::core::params::Params;
use crate::rest::client::BybitClient;
use serde_json::Value;

const DEMO_ENDPOINT: &str = "https://api-demo.bybit.com";

/// Client for the demo trading environment.
///
/// Demo trading lives on its own host and requires API keys created there;
/// mainnet keys are rejected. Orders and positions use the same V5 paths as
/// the live API, each sent as a single signed request.
#[derive(Debug)]
pub struct DemoClient {
    inner: BybitClient,
}

impl DemoClient {
    pub fn new(config: BybitConfig) -> Result<Self, BybitError> {
        let inner = BybitClient::new(config.base_url(DEMO_ENDPOINT.to_string()))?;
        Ok(Self { inner })
    }

    pub fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    /// The underlying client, for endpoints not wrapped here.
    pub fn client(&self) -> &BybitClient {
        &self.inner
    }

    pub async fn get_demo_trading_balance(&self, params: &Params) -> Result<Value, BybitError> {
        self.inner.get_wallet_balance(params).await
    }

    pub async fn create_demo_order(&self, params: &Params) -> Result<Value, BybitError> {
        self.inner.create_order(params).await
    }

    pub async fn get_demo_positions(&self, params: &Params) -> Result<Value, BybitError> {
        self.inner.get_positions(params).await
    }

    /// Request demo funds. `coin` is e.g. "USDT" and `amount` a decimal
    /// string; the faucet caps how much and how often it pays out.
    pub async fn apply_for_demo_funds(&self, coin: &str, amount: &str) -> Result<Value, BybitError> {
        let funds = serde_json::json!([{ "coin": coin, "amountStr": amount }]);
        let params = Params::new()
            .with("adjustType", 0i64)
            .with("utaDemoApplyMoney", funds);
        self.inner.post("/v5/account/demo-apply-money", &params).await
    }
}
