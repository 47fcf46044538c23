//! Bybit v5 REST connector.
//!
//! Instruments are addressed by exchange symbol (e.g. `ETHUSDT`), category
//! `linear`. Signed requests carry an HMAC-SHA256 signature over
//! `timestamp + api_key + recv_window + payload` in the `X-BAPI-SIGN`
//! header, where `payload` is the query string for GETs and the JSON body
//! for POSTs.
//!
//! | Operation      | Method | Path                          |
//! |----------------|--------|-------------------------------|
//! | Balance        | GET    | `/v5/account/wallet-balance`  |
//! | Last price     | GET    | `/v5/market/tickers`          |
//! | Positions      | GET    | `/v5/position/list`           |
//! | Place order    | POST   | `/v5/order/create`            |
//! | Set leverage   | POST   | `/v5/position/set-leverage`   |

use async_trait::async_trait;
use rust_decimal::Decimal;
use tradehook_connectors_common::sign;
use tradehook_core::*;
use tracing::debug;

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";
const RECV_WINDOW: &str = "5000";
const CATEGORY: &str = "linear";

/// Configuration for the Bybit connector.
#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub api_key: String,
    pub api_secret: String,
    pub testnet: bool,
}

/// Bybit connector. One instance per process, shared across requests.
pub struct BybitConnector {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl BybitConnector {
    pub fn new(config: BybitConfig) -> Self {
        let base_url = if config.testnet { TESTNET_URL } else { MAINNET_URL };
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key,
            api_secret: config.api_secret,
            base_url: base_url.to_string(),
        }
    }

    fn auth_headers(&self, timestamp: &str, payload: &str) -> Vec<(&'static str, String)> {
        let message = format!("{timestamp}{}{RECV_WINDOW}{payload}", self.api_key);
        let signature = sign::hmac_sha256_hex(&self.api_secret, &message);
        vec![
            ("X-BAPI-API-KEY", self.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp.to_string()),
            ("X-BAPI-RECV-WINDOW", RECV_WINDOW.to_string()),
            ("X-BAPI-SIGN", signature),
        ]
    }

    /// Signed GET; `query` must already be in final key=value&... form
    /// because it is part of the signed payload.
    async fn signed_get(&self, path: &str, query: &str) -> Result<serde_json::Value, ExchangeError> {
        let timestamp = sign::timestamp_ms();
        let mut request = self
            .http
            .get(format!("{}{}?{}", self.base_url, path, query));
        for (name, value) in self.auth_headers(&timestamp, query) {
            request = request.header(name, value);
        }
        let envelope: serde_json::Value = request
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        Self::unwrap_envelope(envelope)
    }

    async fn signed_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ExchangeError> {
        let timestamp = sign::timestamp_ms();
        let payload = body.to_string();
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json");
        for (name, value) in self.auth_headers(&timestamp, &payload) {
            request = request.header(name, value);
        }
        let envelope: serde_json::Value = request
            .body(payload)
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        Self::unwrap_envelope(envelope)
    }

    /// Unwrap Bybit's `{retCode, retMsg, result}` envelope.
    fn unwrap_envelope(envelope: serde_json::Value) -> Result<serde_json::Value, ExchangeError> {
        let code = envelope
            .get("retCode")
            .and_then(|v| v.as_i64())
            .ok_or(ExchangeError::MissingField("retCode"))?;
        if code != 0 {
            let message = envelope
                .get("retMsg")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            // 10003/10004: invalid key / bad signature.
            if code == 10003 || code == 10004 {
                return Err(ExchangeError::Auth(message));
            }
            return Err(ExchangeError::Api {
                code: code.to_string(),
                message,
            });
        }
        envelope
            .get("result")
            .cloned()
            .ok_or(ExchangeError::MissingField("result"))
    }

    fn parse_decimal(value: &serde_json::Value, field: &'static str) -> Result<Decimal, ExchangeError> {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(ExchangeError::MissingField(field)),
        };
        text.parse()
            .map_err(|_| ExchangeError::Decode(format!("bad decimal in {field}: {text}")))
    }

    fn order_side(side: Side) -> &'static str {
        match side {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

#[async_trait]
impl ExchangeConnector for BybitConnector {
    fn name(&self) -> &'static str {
        "bybit"
    }

    async fn available_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        let query = format!("accountType=UNIFIED&coin={currency}");
        let result = self.signed_get("/v5/account/wallet-balance", &query).await?;
        let coin = result
            .pointer("/list/0/coin/0")
            .ok_or(ExchangeError::MissingField("list[0].coin[0]"))?;
        // `availableToWithdraw` can be blank on unified accounts; fall back
        // to walletBalance.
        let available = coin
            .get("availableToWithdraw")
            .filter(|v| v.as_str().map(|s| !s.is_empty()).unwrap_or(true))
            .or_else(|| coin.get("walletBalance"))
            .ok_or(ExchangeError::MissingField("walletBalance"))?;
        Self::parse_decimal(available, "availableToWithdraw")
    }

    async fn last_price(&self, instrument: &Instrument) -> Result<Decimal, ExchangeError> {
        let query = format!(
            "category={CATEGORY}&symbol={}",
            instrument.exchange_symbol
        );
        let result = self.signed_get("/v5/market/tickers", &query).await?;
        let price = result
            .pointer("/list/0/lastPrice")
            .ok_or(ExchangeError::MissingField("list[0].lastPrice"))?;
        Self::parse_decimal(price, "lastPrice")
    }

    async fn open_positions(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<PositionInfo>, ExchangeError> {
        let query = format!(
            "category={CATEGORY}&symbol={}",
            instrument.exchange_symbol
        );
        let result = self.signed_get("/v5/position/list", &query).await?;
        let rows = result
            .pointer("/list")
            .and_then(|v| v.as_array())
            .ok_or(ExchangeError::MissingField("list[]"))?;

        let mut positions = Vec::new();
        for row in rows {
            let size = Self::parse_decimal(
                row.get("size").ok_or(ExchangeError::MissingField("size"))?,
                "size",
            )?;
            if size.is_zero() {
                continue;
            }
            // Bybit reports unsigned size plus a side field.
            let signed_size = match row.get("side").and_then(|v| v.as_str()) {
                Some("Sell") => -size,
                _ => size,
            };
            let entry_price = row
                .get("avgPrice")
                .and_then(|v| Self::parse_decimal(v, "avgPrice").ok());
            positions.push(PositionInfo {
                instrument: instrument.clone(),
                size: signed_size,
                entry_price,
            });
        }
        Ok(positions)
    }

    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError> {
        let body = serde_json::json!({
            "category": CATEGORY,
            "symbol": request.instrument.exchange_symbol,
            "side": Self::order_side(request.side),
            "orderType": "Market",
            "qty": request.size.to_string(),
            "reduceOnly": request.reduce_only,
            "orderLinkId": request.client_order_id.to_string(),
        });
        debug!(
            symbol = %request.instrument.exchange_symbol,
            side = request.side.as_str(),
            "submitting market order"
        );
        let result = self.signed_post("/v5/order/create", &body).await?;
        Ok(OrderReceipt::new(result))
    }

    async fn set_leverage(
        &self,
        instrument: &Instrument,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        let body = serde_json::json!({
            "category": CATEGORY,
            "symbol": instrument.exchange_symbol,
            "buyLeverage": leverage.to_string(),
            "sellLeverage": leverage.to_string(),
        });
        match self.signed_post("/v5/position/set-leverage", &body).await {
            Ok(_) => Ok(()),
            // 110043: leverage not modified — already at the requested value.
            Err(ExchangeError::Api { ref code, .. }) if code == "110043" => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unwrap_envelope_returns_result_when_ret_code_zero() {
        let envelope = serde_json::json!({"retCode": 0, "retMsg": "OK", "result": {"ok": true}});
        let result = BybitConnector::unwrap_envelope(envelope).unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[test]
    fn unwrap_envelope_maps_nonzero_ret_code_to_api_error() {
        let envelope = serde_json::json!({"retCode": 110007, "retMsg": "ab not enough for new order"});
        let err = BybitConnector::unwrap_envelope(envelope).unwrap_err();
        match err {
            ExchangeError::Api { code, message } => {
                assert_eq!(code, "110007");
                assert!(message.contains("not enough"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn unwrap_envelope_maps_bad_key_to_auth_error() {
        let envelope = serde_json::json!({"retCode": 10003, "retMsg": "API key is invalid"});
        assert!(matches!(
            BybitConnector::unwrap_envelope(envelope).unwrap_err(),
            ExchangeError::Auth(_)
        ));
    }

    #[test]
    fn parse_decimal_accepts_strings_and_numbers() {
        let v = serde_json::json!("3.2");
        assert_eq!(BybitConnector::parse_decimal(&v, "size").unwrap(), dec!(3.2));
        let v = serde_json::json!(10);
        assert_eq!(BybitConnector::parse_decimal(&v, "size").unwrap(), dec!(10));
    }

    #[test]
    fn order_sides_use_bybit_capitalization() {
        assert_eq!(BybitConnector::order_side(Side::Buy), "Buy");
        assert_eq!(BybitConnector::order_side(Side::Sell), "Sell");
    }
}
