use crate::models::*;
use async_trait::async_trait;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Exchange Connector Trait
// ---------------------------------------------------------------------------

/// Errors surfaced by exchange connectors.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("exchange rejected request ({code}): {message}")]
    Api { code: String, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("response missing expected field: {0}")]
    MissingField(&'static str),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// The collaborator contract with an exchange.
///
/// All financial correctness (routing, precision, margin rules) lives behind
/// this trait; the relay only orchestrates call order and propagates results.
/// A single connector instance is constructed at startup and shared across
/// all requests; implementations must be usable through `&self`.
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// Short name for logs ("delta", "bybit", "simulated").
    fn name(&self) -> &'static str;

    /// Available (free) balance for a currency, fetched fresh.
    async fn available_balance(&self, currency: &str) -> Result<Decimal, ExchangeError>;

    /// Last traded / best-ask price for an instrument.
    async fn last_price(&self, instrument: &Instrument) -> Result<Decimal, ExchangeError>;

    /// Open positions on an instrument.
    async fn open_positions(
        &self,
        instrument: &Instrument,
    ) -> Result<Vec<PositionInfo>, ExchangeError>;

    /// Submit a market order. This is the sole call with real-world
    /// consequence; callers must invoke it at most once per request and
    /// never retry it.
    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError>;

    /// Set leverage for an instrument. Callers treat failures as
    /// best-effort and non-fatal.
    async fn set_leverage(
        &self,
        instrument: &Instrument,
        leverage: u32,
    ) -> Result<(), ExchangeError>;
}
