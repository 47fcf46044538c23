use crate::handler::handle_alert;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health_check))
        .route("/webhook", post(webhook))
}

async fn liveness() -> &'static str {
    "tradehook relay running"
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "exchange": state.connector.name(),
        "symbols": state.symbols.len(),
    }))
}

/// `POST /webhook`. Takes the raw body rather than a typed JSON extractor:
/// alerting tools routinely send JSON with a `text/plain` content type, and
/// parse failures must map to the relay's own 400 shape.
async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match handle_alert(&state, &body).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;
    use tradehook_connectors_common::simulated::SimulatedExchange;
    use tradehook_core::SymbolMap;

    fn app(sim: Arc<SimulatedExchange>) -> Router {
        let state = Arc::new(AppState::new(
            sim,
            RelayConfig::default(),
            SymbolMap::default(),
        ));
        crate::build_router(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_serves_liveness_string() {
        let app = app(Arc::new(SimulatedExchange::new()));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_exchange_name() {
        let app = app(Arc::new(SimulatedExchange::new()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["exchange"], "simulated");
    }

    #[tokio::test]
    async fn webhook_accepts_json_sent_as_text_plain() {
        let sim = Arc::new(
            SimulatedExchange::new()
                .with_balance(dec!(1000))
                .with_price("ETH-USD", dec!(2000)),
        );
        let app = app(sim.clone());

        let request = Request::post("/webhook")
            .header("content-type", "text/plain")
            .body(Body::from(
                r#"{"secret":"test1234","symbol":"ETH-USD","side":"buy","qty_pct":50}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert!(json["order"].is_object());
        assert_eq!(sim.order_count(), 1);
    }

    #[tokio::test]
    async fn webhook_rejects_wrong_secret_with_403() {
        let app = app(Arc::new(SimulatedExchange::new()));
        let request = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"secret":"nope","symbol":"ETH-USD","side":"buy"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn webhook_rejects_malformed_body_with_400() {
        let app = app(Arc::new(SimulatedExchange::new()));
        let request = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from("{broken"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
    }

    #[tokio::test]
    async fn webhook_close_without_position_is_info() {
        let app = app(Arc::new(SimulatedExchange::new()));
        let request = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"secret":"test1234","symbol":"ETH-USD","action":"close"}"#,
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "info");
    }
}
