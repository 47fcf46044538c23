use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tradehook_core::ExchangeError;

/// Everything that can go wrong while relaying an alert, in the order the
/// checks run: payload, secret, symbol, command, exchange.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid JSON payload: {0}")]
    InvalidPayload(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("missing symbol")]
    MissingSymbol,
    #[error("symbol '{0}' not found in symbol map")]
    UnknownSymbol(String),
    #[error("invalid command: expected side \"buy\" or action \"close\"")]
    InvalidCommand,
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidPayload(_)
            | RelayError::MissingSymbol
            | RelayError::UnknownSymbol(_)
            | RelayError::InvalidCommand => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized => StatusCode::FORBIDDEN,
            RelayError::Exchange(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            RelayError::InvalidPayload("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(RelayError::MissingSymbol.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::UnknownSymbol("DOGE-USD".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::InvalidCommand.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::Exchange(ExchangeError::MissingField("price")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
