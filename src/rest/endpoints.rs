use crate::core::errors::BybitError;
use crate::core::params::Params;
use crate::rest::client::BybitClient;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

/// Market category for convenience order assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketType {
    Spot,
    Linear,
}

impl MarketType {
    pub(crate) fn category(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Limit,
    Market,
    /// Market order armed at a trigger price.
    Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlTpMode {
    /// Take-profit/stop-loss given as absolute prices.
    Absolute,
    /// Given as fractions of the entry price (0.05 = 5%).
    Percent,
}

#[derive(Debug, Clone)]
pub struct SlTp {
    pub mode: SlTpMode,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

/// Convenience order description; `place_order` turns this into a V5
/// `/v5/order/create` payload.
#[derive(Debug, Clone)]
pub struct PlaceOrderParams {
    pub market: MarketType,
    pub symbol: String,
    pub execution: Execution,
    pub price: Option<Decimal>,
    pub side: Option<Side>,
    pub leverage: Option<Decimal>,
    /// Order size: base quantity for spot, margin for derivatives.
    pub size: Decimal,
    pub sl_tp: Option<SlTp>,
    pub extra: Option<Params>,
}

// V5 endpoint wrappers. These are plain parameter marshaling on top of the
// signed `request` path; parameter validation is the server's job.
impl BybitClient {
    pub async fn get_server_time(&self) -> Result<Value, BybitError> {
        self.get("/v5/market/time", &Params::new()).await
    }

    pub async fn get_tickers(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/tickers", params).await
    }

    pub async fn get_kline(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/kline", params).await
    }

    pub async fn get_orderbook(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/orderbook", params).await
    }

    pub async fn get_rpi_orderbook(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/rpi-orderbook", params).await
    }

    pub async fn get_open_interest(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/open-interest", params).await
    }

    pub async fn get_recent_trades(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/recent-trade", params).await
    }

    pub async fn get_funding_rate_history(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/funding/history", params).await
    }

    pub async fn get_historical_volatility(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/historical-volatility", params).await
    }

    pub async fn get_insurance(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/insurance", params).await
    }

    pub async fn get_risk_limit(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/market/risk-limit", params).await
    }

    pub async fn create_order(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/order/create", params).await
    }

    pub async fn get_open_orders(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/order/realtime", params).await
    }

    pub async fn cancel_order(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/order/cancel", params).await
    }

    pub async fn amend_order(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/order/amend", params).await
    }

    pub async fn cancel_all_orders(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/order/cancel-all", params).await
    }

    pub async fn get_history_orders(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/order/history", params).await
    }

    pub async fn get_wallet_balance(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/account/wallet-balance", params).await
    }

    pub async fn get_transferable_amount(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/account/transferable-amount", params).await
    }

    pub async fn get_transaction_log(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/account/transaction-log", params).await
    }

    pub async fn get_account_info(&self) -> Result<Value, BybitError> {
        self.get("/v5/account/info", &Params::new()).await
    }

    pub async fn get_account_instruments_info(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/account/instruments", params).await
    }

    pub async fn get_positions(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/position/list", params).await
    }

    pub async fn switch_position_mode(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/switch-mode", params).await
    }

    pub async fn set_trading_stop(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/trading-stop", params).await
    }

    pub async fn set_auto_add_margin(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/set-auto-add-margin", params).await
    }

    pub async fn add_or_reduce_margin(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/add-margin", params).await
    }

    pub async fn get_closed_pnl(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/position/closed-pnl", params).await
    }

    pub async fn get_closed_options_positions(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/position/close-position", params).await
    }

    pub async fn move_position(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/move-positions", params).await
    }

    pub async fn get_move_position_history(&self, params: &Params) -> Result<Value, BybitError> {
        self.get("/v5/position/move-position-history", params).await
    }

    pub async fn confirm_new_risk_limit(&self, params: &Params) -> Result<Value, BybitError> {
        self.post("/v5/position/confirm-pending-mmr", params).await
    }

    /// Set leverage for a symbol; `side` limits the change to one direction.
    pub async fn set_leverage(
        &self,
        category: &str,
        symbol: &str,
        leverage: Decimal,
        side: Option<Side>,
    ) -> Result<Value, BybitError> {
        let leverage = leverage.round_dp(2);
        let mut params = Params::new().with("category", category).with("symbol", symbol);

        match side {
            Some(Side::Buy) => params.insert("buyLeverage", leverage),
            Some(Side::Sell) => params.insert("sellLeverage", leverage),
            None => {
                params.insert("buyLeverage", leverage);
                params.insert("sellLeverage", leverage);
            }
        }

        self.post("/v5/position/set-leverage", &params).await
    }

    /// Latest traded price for a symbol, falling back through mark and best
    /// bid when the ticker omits fields.
    pub async fn last_price(&self, symbol: &str, category: &str) -> Result<Decimal, BybitError> {
        let res = self
            .get_tickers(&Params::new().with("category", category).with("symbol", symbol))
            .await?;

        let ticker = res
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .ok_or_else(|| BybitError::InvalidResponse("no ticker data found".to_string()))?;

        for field in ["lastPrice", "markPrice", "bid1Price"] {
            if let Some(price) = ticker.get(field).and_then(Value::as_str) {
                return price
                    .parse::<Decimal>()
                    .map_err(|e| BybitError::InvalidResponse(format!("bad price: {}", e)));
            }
        }

        Err(BybitError::InvalidResponse(
            "no price data found".to_string(),
        ))
    }

    /// Assemble and submit an order from the convenience description.
    ///
    /// Spot orders take `size` as base quantity. Derivative orders take it
    /// as margin: the quantity is `margin * leverage / entry_price`, using
    /// the last traded price when no limit price is given.
    pub async fn place_order(&self, order: PlaceOrderParams) -> Result<Value, BybitError> {
        let category = order.market.category();
        let side = order.side.unwrap_or(Side::Buy);
        let order_type = match order.execution {
            Execution::Limit => "Limit",
            Execution::Market | Execution::Trigger => "Market",
        };

        let mut payload = Params::new()
            .with("category", category)
            .with("symbol", order.symbol.clone())
            .with("side", side.as_str())
            .with("orderType", order_type);

        // Entry price used for derivative sizing and percent SL/TP
        let mut entry_price = Decimal::ZERO;

        if order.market == MarketType::Spot {
            if order.execution == Execution::Limit {
                if let Some(price) = order.price {
                    payload.insert("price", price.round_dp(8));
                    entry_price = price;
                }
            }
            payload.insert("qty", order.size.round_dp(8));
        } else {
            if order.execution == Execution::Limit && order.price.is_some() {
                entry_price = order.price.unwrap_or_default();
            } else {
                match self.last_price(&order.symbol, category).await {
                    Ok(price) => entry_price = price,
                    Err(e) => {
                        warn!("falling back to limit price for sizing: {}", e);
                        entry_price = order.price.unwrap_or_default();
                    }
                }
            }

            let mut leverage = Decimal::ONE;
            if let Some(requested) = order.leverage {
                if requested > Decimal::ZERO {
                    leverage = requested;
                    if let Err(e) = self
                        .set_leverage(category, &order.symbol, leverage, Some(side))
                        .await
                    {
                        warn!("failed to set leverage: {}", e);
                    }
                }
            }

            let floor = Decimal::new(1, 7);
            if entry_price < floor {
                entry_price = floor;
            }
            let qty = (order.size * leverage / entry_price).round_dp(8);
            payload.insert("qty", qty);

            if order.execution == Execution::Limit {
                if let Some(price) = order.price {
                    payload.insert("price", price.round_dp(8));
                }
            }
            payload.insert("positionIdx", 0i64);
        }

        if order.execution == Execution::Trigger {
            payload.insert("orderType", "Market");
            if let Some(price) = order.price {
                payload.insert("triggerPrice", price.round_dp(8));
            }
            let direction = if side == Side::Buy { 1i64 } else { 2i64 };
            payload.insert("triggerDirection", direction);
        }

        if let Some(sl_tp) = &order.sl_tp {
            if order.market != MarketType::Spot {
                let mut take_profit = sl_tp.take_profit;
                let mut stop_loss = sl_tp.stop_loss;

                if sl_tp.mode == SlTpMode::Percent {
                    let basis = if entry_price > Decimal::ZERO {
                        entry_price
                    } else {
                        self.last_price(&order.symbol, category)
                            .await
                            .unwrap_or_default()
                    };

                    take_profit = take_profit.map(|tp| match side {
                        Side::Buy => basis * (Decimal::ONE + tp),
                        Side::Sell => basis * (Decimal::ONE - tp),
                    });
                    stop_loss = stop_loss.map(|sl| match side {
                        Side::Buy => basis * (Decimal::ONE - sl),
                        Side::Sell => basis * (Decimal::ONE + sl),
                    });
                }

                if let Some(tp) = take_profit {
                    payload.insert("takeProfit", tp.round_dp(8));
                }
                if let Some(sl) = stop_loss {
                    payload.insert("stopLoss", sl.round_dp(8));
                }
            }
        }

        if let Some(extra) = &order.extra {
            for (key, value) in extra.iter() {
                payload.insert(key, value.clone());
            }
        }

        self.create_order(&payload).await
    }
}
