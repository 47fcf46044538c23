use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// The inbound webhook payload from a charting/alerting tool.
///
/// Alerts are transient: constructed per request, discarded after the
/// response is sent. Unknown fields are ignored so that alert templates can
/// carry extra annotations without breaking the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    /// Static shared secret; must equal the configured value exactly.
    #[serde(default)]
    pub secret: String,
    /// Instrument identifier as the alerting tool knows it (e.g. "ETH-USD").
    pub symbol: Option<String>,
    /// Recognized value: "buy".
    pub side: Option<String>,
    /// Recognized value: "close".
    pub action: Option<String>,
    /// Percentage (0-100) of the available quote balance to commit.
    /// Absent or unparsable values fall back to zero.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub qty_pct: Decimal,
    /// Optional leverage to apply before sizing (>= 1).
    pub leverage: Option<u32>,
}

/// Deserialize a decimal, treating anything unparsable as zero.
///
/// Alert templates frequently interpolate `qty_pct` as a bare number, a
/// quoted string, or leave it out entirely; the original services coerced
/// all of those to `0` rather than rejecting the alert.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.to_string().parse().ok(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or(Decimal::ZERO))
}

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// A tradable instrument resolved from the symbol map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// The symbol as it appears in alerts (map key, e.g. "ETH-USD").
    pub alert_symbol: String,
    /// The exchange-native symbol (e.g. "ETHUSDT" on Bybit).
    pub exchange_symbol: String,
    /// Numeric product id for exchanges that address instruments by id
    /// (Delta-style). `None` for symbol-addressed exchanges.
    pub product_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// A market order to be submitted through a connector.
#[derive(Debug, Clone, Serialize)]
pub struct MarketOrderRequest {
    pub instrument: Instrument,
    pub side: Side,
    pub size: Decimal,
    /// Only decrease an existing position, never open a new one.
    pub reduce_only: bool,
    /// Client-assigned id for log correlation; the exchange may echo it back.
    pub client_order_id: Uuid,
}

impl MarketOrderRequest {
    pub fn new(instrument: Instrument, side: Side, size: Decimal) -> Self {
        Self {
            instrument,
            side,
            size,
            reduce_only: false,
            client_order_id: Uuid::new_v4(),
        }
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// The exchange's response to an order submission.
///
/// The relay does not interpret the order object beyond extracting an id for
/// logging; the raw value is returned verbatim to the webhook caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    /// The order object exactly as the exchange returned it.
    pub raw: serde_json::Value,
}

impl OrderReceipt {
    pub fn new(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    /// Best-effort exchange order id, for logging.
    pub fn order_id(&self) -> Option<String> {
        let id = self.raw.get("id").or_else(|| self.raw.get("orderId"))?;
        match id {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An open exposure on an instrument, fetched fresh per request and used
/// only to determine close-order size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub instrument: Instrument,
    /// Signed size: positive for long, negative for short.
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
}

impl PositionInfo {
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }
}
