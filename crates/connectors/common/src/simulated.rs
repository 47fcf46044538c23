use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;
use tradehook_core::*;

/// One connector call observed by the simulated exchange, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Balance { currency: String },
    Price { symbol: String },
    Positions { symbol: String },
    Order { symbol: String },
    Leverage { symbol: String, leverage: u32 },
}

#[derive(Debug, Default)]
struct Inner {
    balance: Decimal,
    prices: std::collections::HashMap<String, Decimal>,
    positions: Vec<PositionInfo>,
    calls: Vec<RecordedCall>,
    orders: Vec<MarketOrderRequest>,
    next_order_id: i64,
    fail_balance: bool,
    fail_leverage: bool,
}

/// An in-memory exchange for tests and `--exchange simulated` dry runs.
///
/// Serves a fixed balance, per-symbol prices, and a position list, and
/// records every connector call so tests can assert which exchange
/// interactions happened (and, just as importantly, which did not).
pub struct SimulatedExchange {
    inner: Mutex<Inner>,
}

impl Default for SimulatedExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedExchange {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_order_id: 1,
                ..Inner::default()
            }),
        }
    }

    pub fn with_balance(self, balance: Decimal) -> Self {
        self.inner.lock().unwrap().balance = balance;
        self
    }

    pub fn with_price(self, alert_symbol: &str, price: Decimal) -> Self {
        self.inner
            .lock()
            .unwrap()
            .prices
            .insert(alert_symbol.to_string(), price);
        self
    }

    pub fn with_position(self, position: PositionInfo) -> Self {
        self.inner.lock().unwrap().positions.push(position);
        self
    }

    /// Make `available_balance` fail, to exercise the 500 path.
    pub fn failing_balance(self) -> Self {
        self.inner.lock().unwrap().fail_balance = true;
        self
    }

    /// Make `set_leverage` fail, to exercise the best-effort policy.
    pub fn failing_leverage(self) -> Self {
        self.inner.lock().unwrap().fail_leverage = true;
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// All orders submitted so far, in order.
    pub fn orders(&self) -> Vec<MarketOrderRequest> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }
}

#[async_trait]
impl ExchangeConnector for SimulatedExchange {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn available_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall::Balance {
            currency: currency.to_string(),
        });
        if inner.fail_balance {
            return Err(ExchangeError::Api {
                code: "sim".to_string(),
                message: "balance fetch configured to fail".to_string(),
            });
        }
        Ok(inner.balance)
    }

    async fn last_price(&self, instrument: &Instrument) -> Result<Decimal, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall::Price {
            symbol: instrument.alert_symbol.clone(),
        });
        inner
            .prices
            .get(&instrument.alert_symbol)
            .copied()
            .ok_or(ExchangeError::MissingField("price"))
    }

    async fn open_positions(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<PositionInfo>, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall::Positions {
            symbol: instrument.alert_symbol.clone(),
        });
        Ok(inner
            .positions
            .iter()
            .filter(|p| p.instrument.alert_symbol == instrument.alert_symbol)
            .cloned()
            .collect())
    }

    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall::Order {
            symbol: request.instrument.alert_symbol.clone(),
        });
        inner.orders.push(request.clone());
        let id = inner.next_order_id;
        inner.next_order_id += 1;
        Ok(OrderReceipt::new(serde_json::json!({
            "id": id,
            "symbol": request.instrument.exchange_symbol,
            "side": request.side.as_str(),
            "size": request.size.to_string(),
            "reduce_only": request.reduce_only,
            "state": "open",
        })))
    }

    async fn set_leverage(
        &self,
        instrument: &Instrument,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall::Leverage {
            symbol: instrument.alert_symbol.clone(),
            leverage,
        });
        if inner.fail_leverage {
            return Err(ExchangeError::Api {
                code: "sim".to_string(),
                message: "leverage configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instrument(symbol: &str) -> Instrument {
        Instrument {
            alert_symbol: symbol.to_string(),
            exchange_symbol: symbol.replace('-', ""),
            product_id: None,
        }
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let sim = SimulatedExchange::new()
            .with_balance(dec!(1000))
            .with_price("ETH-USD", dec!(2000));
        let inst = instrument("ETH-USD");

        sim.available_balance("USDT").await.unwrap();
        sim.last_price(&inst).await.unwrap();

        assert_eq!(
            sim.calls(),
            vec![
                RecordedCall::Balance { currency: "USDT".to_string() },
                RecordedCall::Price { symbol: "ETH-USD".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn positions_filtered_by_instrument() {
        let sim = SimulatedExchange::new()
            .with_position(PositionInfo {
                instrument: instrument("ETH-USD"),
                size: dec!(3.2),
                entry_price: None,
            })
            .with_position(PositionInfo {
                instrument: instrument("BTC-USD"),
                size: dec!(0.1),
                entry_price: None,
            });

        let positions = sim.open_positions(&instrument("ETH-USD")).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].size, dec!(3.2));
    }

    #[tokio::test]
    async fn orders_get_distinct_ids() {
        let sim = SimulatedExchange::new();
        let req = MarketOrderRequest::new(instrument("ETH-USD"), Side::Buy, dec!(1));
        let a = sim.place_market_order(&req).await.unwrap();
        let b = sim.place_market_order(&req).await.unwrap();
        assert_ne!(a.order_id(), b.order_id());
        assert_eq!(sim.order_count(), 2);
    }
}
