/// The out-of-the-box webhook secret. Fine for local experiments, loudly
/// warned about at startup; deployments must override it.
pub const DEFAULT_WEBHOOK_SECRET: &str = "test1234";

/// Static relay configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Shared secret every alert must carry, compared by string equality.
    pub webhook_secret: String,
    /// Currency balances are measured and orders are sized in.
    pub quote_currency: String,
}

impl RelayConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.webhook_secret == DEFAULT_WEBHOOK_SECRET
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_secret: DEFAULT_WEBHOOK_SECRET.to_string(),
            quote_currency: "USDT".to_string(),
        }
    }
}
