//! Delta Exchange REST connector.
//!
//! Instruments are addressed by numeric product id. Signed requests carry
//! an HMAC-SHA256 signature over `method + timestamp + path + query + body`
//! in the `signature` header, alongside `api-key` and `timestamp` (seconds).
//!
//! | Operation      | Method | Path                                    |
//! |----------------|--------|-----------------------------------------|
//! | Balances       | GET    | `/v2/wallet/balances`                   |
//! | Best ask       | GET    | `/v2/l2orderbook/{product_id}`          |
//! | Positions      | GET    | `/v2/positions/margined`                |
//! | Place order    | POST   | `/v2/orders`                            |
//! | Set leverage   | POST   | `/v2/products/{id}/orders/leverage`     |

use async_trait::async_trait;
use rust_decimal::Decimal;
use tradehook_connectors_common::sign;
use tradehook_core::*;
use tracing::debug;

const MAINNET_URL: &str = "https://api.delta.exchange";
const TESTNET_URL: &str = "https://testnet-api.delta.exchange";

/// Configuration for the Delta connector.
#[derive(Debug, Clone)]
pub struct DeltaConfig {
    pub api_key: String,
    pub api_secret: String,
    pub testnet: bool,
}

/// Delta Exchange connector. One instance per process, shared across
/// requests; holds only credentials and a reqwest client.
pub struct DeltaConnector {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl DeltaConnector {
    pub fn new(config: DeltaConfig) -> Self {
        let base_url = if config.testnet { TESTNET_URL } else { MAINNET_URL };
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key,
            api_secret: config.api_secret,
            base_url: base_url.to_string(),
        }
    }

    fn product_id(instrument: &Instrument) -> Result<i64, ExchangeError> {
        instrument
            .product_id
            .ok_or(ExchangeError::MissingField("product_id"))
    }

    /// Send a signed request and unwrap Delta's `{"success", "result"}`
    /// envelope.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ExchangeError> {
        let timestamp = sign::timestamp_secs();
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let message = format!("{}{}{}{}", method.as_str(), timestamp, path, payload);
        let signature = sign::hmac_sha256_hex(&self.api_secret, &message);

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .header("api-key", &self.api_key)
            .header("timestamp", &timestamp)
            .header("signature", &signature);
        if !payload.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;
        let status = response.status();
        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;

        Self::unwrap_envelope(status, envelope)
    }

    /// Send an unsigned (public) request and unwrap the envelope.
    async fn public_request(&self, path: &str) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;
        let status = response.status();
        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;

        Self::unwrap_envelope(status, envelope)
    }

    fn unwrap_envelope(
        status: reqwest::StatusCode,
        envelope: serde_json::Value,
    ) -> Result<serde_json::Value, ExchangeError> {
        let success = envelope
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !success {
            let code = envelope
                .pointer("/error/code")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let message = envelope
                .get("error")
                .map(|e| e.to_string())
                .unwrap_or_else(|| envelope.to_string());
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(ExchangeError::Auth(message));
            }
            return Err(ExchangeError::Api { code, message });
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
}

#[async_trait]
impl ExchangeConnector for DeltaConnector {
    fn name(&self) -> &'static str {
        "delta"
    }

    async fn available_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        let result = self
            .signed_request(reqwest::Method::GET, "/v2/wallet/balances", None)
            .await?;
        let balances = result
            .as_array()
            .ok_or(ExchangeError::MissingField("result[]"))?;
        let entry = balances
            .iter()
            .find(|b| {
                b.get("asset_symbol").and_then(|v| v.as_str()) == Some(currency)
            })
            .ok_or(ExchangeError::MissingField("asset balance"))?;
        let available = entry
            .get("available_balance")
            .ok_or(ExchangeError::MissingField("available_balance"))?;
        Self::parse_decimal(available, "available_balance")
    }

    async fn last_price(&self, instrument: &Instrument) -> Result<Decimal, ExchangeError> {
        let product_id = Self::product_id(instrument)?;
        let result = self
            .public_request(&format!("/v2/l2orderbook/{product_id}"))
            .await?;
        // Best ask, matching the original sizing behavior.
        let best_ask = result
            .pointer("/sell/0/price")
            .ok_or(ExchangeError::MissingField("sell[0].price"))?;
        Self::parse_decimal(best_ask, "sell[0].price")
    }

    async fn open_positions(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<PositionInfo>, ExchangeError> {
        let product_id = Self::product_id(instrument)?;
        let result = self
            .signed_request(reqwest::Method::GET, "/v2/positions/margined", None)
            .await?;
        let rows = result
            .as_array()
            .ok_or(ExchangeError::MissingField("result[]"))?;

        let mut positions = Vec::new();
        for row in rows {
            if row.get("product_id").and_then(|v| v.as_i64()) != Some(product_id) {
                continue;
            }
            let size = Self::parse_decimal(
                row.get("size").ok_or(ExchangeError::MissingField("size"))?,
                "size",
            )?;
            let entry_price = row
                .get("entry_price")
                .and_then(|v| Self::parse_decimal(v, "entry_price").ok());
            positions.push(PositionInfo {
                instrument: instrument.clone(),
                size,
                entry_price,
            });
        }
        Ok(positions)
    }

    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError> {
        let product_id = Self::product_id(&request.instrument)?;
        let body = serde_json::json!({
            "product_id": product_id,
            "size": request.size.to_string(),
            "side": request.side.as_str(),
            "order_type": "market_order",
            "reduce_only": request.reduce_only,
            "client_order_id": request.client_order_id.to_string(),
        });
        debug!(product_id, side = request.side.as_str(), "submitting market order");
        let result = self
            .signed_request(reqwest::Method::POST, "/v2/orders", Some(&body))
            .await?;
        Ok(OrderReceipt::new(result))
    }

    async fn set_leverage(
        &self,
        instrument: &Instrument,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        let product_id = Self::product_id(instrument)?;
        let body = serde_json::json!({ "leverage": leverage.to_string() });
        self.signed_request(
            reqwest::Method::POST,
            &format!("/v2/products/{product_id}/orders/leverage"),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unwrap_envelope_returns_result_on_success() {
        let envelope = serde_json::json!({"success": true, "result": [1, 2]});
        let result =
            DeltaConnector::unwrap_envelope(reqwest::StatusCode::OK, envelope).unwrap();
        assert_eq!(result, serde_json::json!([1, 2]));
    }

    #[test]
    fn unwrap_envelope_maps_failure_to_api_error() {
        let envelope = serde_json::json!({
            "success": false,
            "error": {"code": "insufficient_margin"}
        });
        let err =
            DeltaConnector::unwrap_envelope(reqwest::StatusCode::BAD_REQUEST, envelope)
                .unwrap_err();
        match err {
            ExchangeError::Api { code, .. } => assert_eq!(code, "insufficient_margin"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn unwrap_envelope_maps_401_to_auth_error() {
        let envelope = serde_json::json!({"success": false, "error": {"code": "unauthorized"}});
        let err =
            DeltaConnector::unwrap_envelope(reqwest::StatusCode::UNAUTHORIZED, envelope)
                .unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));
    }

    #[test]
    fn parse_decimal_accepts_strings_and_numbers() {
        let v = serde_json::json!("1234.5");
        assert_eq!(DeltaConnector::parse_decimal(&v, "x").unwrap(), dec!(1234.5));
        let v = serde_json::json!(42);
        assert_eq!(DeltaConnector::parse_decimal(&v, "x").unwrap(), dec!(42));
    }

    #[test]
    fn missing_product_id_is_rejected() {
        let inst = Instrument {
            alert_symbol: "ETH-USD".to_string(),
            exchange_symbol: "ETHUSD".to_string(),
            product_id: None,
        };
        assert!(matches!(
            DeltaConnector::product_id(&inst),
            Err(ExchangeError::MissingField("product_id"))
        ));
    }
}
