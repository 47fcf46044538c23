use crate::models::Instrument;
use serde::Deserialize;
use std::collections::HashMap;

/// Static map from alert symbols to tradable instruments.
///
/// Loaded once at startup, either from a TOML file or from the built-in
/// defaults. Resolution failures are rejected before any exchange call.
#[derive(Debug, Clone)]
pub struct SymbolMap {
    entries: HashMap<String, Instrument>,
}

/// One `[[symbols]]` entry in the TOML file.
#[derive(Debug, Deserialize)]
struct SymbolEntry {
    alert_symbol: String,
    exchange_symbol: String,
    product_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SymbolFile {
    symbols: Vec<SymbolEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolMapError {
    #[error("failed to parse symbol map: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("symbol map contains no entries")]
    Empty,
}

impl SymbolMap {
    /// Parse a symbol map from TOML:
    ///
    /// ```toml
    /// [[symbols]]
    /// alert_symbol = "ETH-USD"
    /// exchange_symbol = "ETHUSD"
    /// product_id = 3136
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, SymbolMapError> {
        let file: SymbolFile = toml::from_str(raw)?;
        if file.symbols.is_empty() {
            return Err(SymbolMapError::Empty);
        }
        let entries = file
            .symbols
            .into_iter()
            .map(|e| {
                (
                    e.alert_symbol.clone(),
                    Instrument {
                        alert_symbol: e.alert_symbol,
                        exchange_symbol: e.exchange_symbol,
                        product_id: e.product_id,
                    },
                )
            })
            .collect();
        Ok(Self { entries })
    }

    /// Resolve an alert symbol to an instrument.
    pub fn resolve(&self, symbol: &str) -> Option<&Instrument> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.entries.values()
    }
}

impl Default for SymbolMap {
    /// The instruments the original services shipped with.
    fn default() -> Self {
        let entries = [
            Instrument {
                alert_symbol: "ETH-USD".to_string(),
                exchange_symbol: "ETHUSD".to_string(),
                product_id: Some(3136),
            },
            Instrument {
                alert_symbol: "BTC-USD".to_string(),
                exchange_symbol: "BTCUSD".to_string(),
                product_id: Some(1),
            },
        ]
        .into_iter()
        .map(|i| (i.alert_symbol.clone(), i))
        .collect();
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_resolves_shipped_symbols() {
        let map = SymbolMap::default();
        let eth = map.resolve("ETH-USD").expect("ETH-USD in default map");
        assert_eq!(eth.product_id, Some(3136));
        assert!(map.resolve("DOGE-USD").is_none());
    }

    #[test]
    fn parses_toml_entries() {
        let raw = r#"
            [[symbols]]
            alert_symbol = "SOL-USD"
            exchange_symbol = "SOLUSDT"

            [[symbols]]
            alert_symbol = "BTC-USD"
            exchange_symbol = "BTCUSD"
            product_id = 1
        "#;
        let map = SymbolMap::from_toml_str(raw).unwrap();
        assert_eq!(map.len(), 2);
        let sol = map.resolve("SOL-USD").unwrap();
        assert_eq!(sol.exchange_symbol, "SOLUSDT");
        assert_eq!(sol.product_id, None);
    }

    #[test]
    fn rejects_empty_map() {
        assert!(matches!(
            SymbolMap::from_toml_str("symbols = []"),
            Err(SymbolMapError::Empty)
        ));
    }
}
