use crate::config::RelayConfig;
use std::sync::Arc;
use tradehook_core::{ExchangeConnector, SymbolMap};

/// Shared application state accessible by all route handlers.
///
/// The connector is the single long-lived exchange handle: constructed once
/// at startup, never rebuilt per request. There is no per-symbol locking,
/// so two concurrent alerts for the same symbol can both read the same
/// balance before either order is placed.
pub struct AppState {
    pub connector: Arc<dyn ExchangeConnector>,
    pub config: RelayConfig,
    pub symbols: SymbolMap,
}

impl AppState {
    pub fn new(
        connector: Arc<dyn ExchangeConnector>,
        config: RelayConfig,
        symbols: SymbolMap,
    ) -> Self {
        Self {
            connector,
            config,
            symbols,
        }
    }
}
