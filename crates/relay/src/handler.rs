use crate::error::RelayError;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tradehook_core::*;

/// Successful end of an alert's journey. Both variants are HTTP 200; a
/// close with nothing to close is informational, not an error.
#[derive(Debug)]
pub enum RelayOutcome {
    OrderPlaced(OrderReceipt),
    NoPositionToClose { symbol: String },
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        match self {
            RelayOutcome::OrderPlaced(receipt) => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "success",
                    "order": receipt.raw,
                })),
            )
                .into_response(),
            RelayOutcome::NoPositionToClose { symbol } => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "info",
                    "message": format!("No open position for {symbol}"),
                })),
            )
                .into_response(),
        }
    }
}

/// Relay one alert: parse, authenticate, resolve the instrument, then run
/// the buy or close flow. Each check rejects before any exchange call is
/// made; each successful flow performs exactly one order submission, never
/// retried. Duplicate alerts produce duplicate orders.
pub async fn handle_alert(state: &AppState, body: &[u8]) -> Result<RelayOutcome, RelayError> {
    let alert: Alert =
        serde_json::from_slice(body).map_err(|e| RelayError::InvalidPayload(e.to_string()))?;

    if alert.secret != state.config.webhook_secret {
        warn!("alert rejected: secret mismatch");
        return Err(RelayError::Unauthorized);
    }

    let symbol = alert.symbol.as_deref().ok_or(RelayError::MissingSymbol)?;
    let instrument = state
        .symbols
        .resolve(symbol)
        .ok_or_else(|| RelayError::UnknownSymbol(symbol.to_string()))?
        .clone();

    if alert.side.as_deref() == Some("buy") {
        buy(state, &instrument, &alert).await
    } else if alert.action.as_deref() == Some("close") {
        close(state, &instrument).await
    } else {
        Err(RelayError::InvalidCommand)
    }
}

/// Market-buy sized as a percentage of the available quote balance.
async fn buy(
    state: &AppState,
    instrument: &Instrument,
    alert: &Alert,
) -> Result<RelayOutcome, RelayError> {
    if let Some(leverage) = alert.leverage {
        // Best-effort, non-fatal: a failed leverage change is logged and
        // trading proceeds at whatever leverage is already active.
        if let Err(err) = state.connector.set_leverage(instrument, leverage).await {
            warn!(
                symbol = %instrument.alert_symbol,
                leverage,
                error = %err,
                "leverage set failed, continuing"
            );
        }
    }

    let balance = state
        .connector
        .available_balance(&state.config.quote_currency)
        .await?;
    let price = state.connector.last_price(instrument).await?;
    if price <= Decimal::ZERO {
        return Err(ExchangeError::Decode(format!("non-positive price: {price}")).into());
    }

    let size = order_size(balance, alert.qty_pct, price);
    if size <= Decimal::ZERO {
        // A zero qty_pct flows through as a zero-size submission and is
        // left for the exchange to reject.
        warn!(
            symbol = %instrument.alert_symbol,
            qty_pct = %alert.qty_pct,
            "computed order size is not positive, submitting anyway"
        );
    }

    info!(
        symbol = %instrument.alert_symbol,
        %balance,
        %price,
        %size,
        "placing market buy"
    );
    let request = MarketOrderRequest::new(instrument.clone(), Side::Buy, size);
    let receipt = state.connector.place_market_order(&request).await?;
    info!(
        symbol = %instrument.alert_symbol,
        order_id = receipt.order_id().as_deref().unwrap_or("?"),
        "order placed"
    );
    Ok(RelayOutcome::OrderPlaced(receipt))
}

/// Reduce-only market sell for the full size of the open long position,
/// if there is one.
async fn close(state: &AppState, instrument: &Instrument) -> Result<RelayOutcome, RelayError> {
    let positions = state.connector.open_positions(instrument).await?;
    let Some(position) = positions.iter().find(|p| p.is_long()) else {
        info!(symbol = %instrument.alert_symbol, "no open position to close");
        return Ok(RelayOutcome::NoPositionToClose {
            symbol: instrument.alert_symbol.clone(),
        });
    };

    info!(
        symbol = %instrument.alert_symbol,
        size = %position.size,
        "closing position"
    );
    let request =
        MarketOrderRequest::new(instrument.clone(), Side::Sell, position.size).reduce_only();
    let receipt = state.connector.place_market_order(&request).await?;
    info!(
        symbol = %instrument.alert_symbol,
        order_id = receipt.order_id().as_deref().unwrap_or("?"),
        "close order placed"
    );
    Ok(RelayOutcome::OrderPlaced(receipt))
}

/// `size = balance * (qty_pct / 100) / price`, rounded to 4 decimal places.
fn order_size(balance: Decimal, qty_pct: Decimal, price: Decimal) -> Decimal {
    let spend = balance * qty_pct / dec!(100);
    (spend / price).round_dp(4)
}
