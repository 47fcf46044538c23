use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use tradehook_connectors_bybit::{BybitConfig, BybitConnector};
use tradehook_connectors_common::simulated::SimulatedExchange;
use tradehook_connectors_delta::{DeltaConfig, DeltaConnector};
use tradehook_core::{ExchangeConnector, SymbolMap};
use tradehook_relay::config::{RelayConfig, DEFAULT_WEBHOOK_SECRET};
use tradehook_relay::state::AppState;

#[derive(Parser)]
#[command(name = "tradehook")]
#[command(about = "Webhook relay — turn charting-tool alerts into exchange orders")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook relay server
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:5000", env = "BIND_ADDR")]
        bind: String,

        /// Exchange connector to relay orders to
        #[arg(short, long, value_enum, default_value = "delta", env = "EXCHANGE")]
        exchange: Exchange,

        /// Exchange API key
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Exchange API secret
        #[arg(long, env = "API_SECRET", hide_env_values = true)]
        api_secret: Option<String>,

        /// Shared secret alerts must carry
        #[arg(
            long,
            env = "WEBHOOK_SECRET",
            hide_env_values = true,
            default_value = DEFAULT_WEBHOOK_SECRET
        )]
        webhook_secret: String,

        /// Quote currency orders are sized in
        #[arg(long, default_value = "USDT")]
        quote_currency: String,

        /// Use the exchange's testnet endpoints
        #[arg(long)]
        testnet: bool,

        /// Path to a TOML symbol map (defaults to the built-in map)
        #[arg(long)]
        symbols: Option<PathBuf>,
    },

    /// Print the symbol map the relay would serve
    Symbols {
        /// Path to a TOML symbol map (defaults to the built-in map)
        #[arg(long)]
        symbols: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Exchange {
    Delta,
    Bybit,
    /// In-memory exchange for dry runs; no real orders are placed
    Simulated,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Serve {
            bind,
            exchange,
            api_key,
            api_secret,
            webhook_secret,
            quote_currency,
            testnet,
            symbols,
        } => {
            serve(
                bind,
                exchange,
                api_key,
                api_secret,
                webhook_secret,
                quote_currency,
                testnet,
                symbols,
            )
            .await?;
        }
        Commands::Symbols { symbols } => {
            let map = load_symbol_map(symbols)?;
            println!("Configured symbols:");
            for instrument in map.iter() {
                match instrument.product_id {
                    Some(id) => println!(
                        "  {:<12} -> {} (product {})",
                        instrument.alert_symbol, instrument.exchange_symbol, id
                    ),
                    None => println!(
                        "  {:<12} -> {}",
                        instrument.alert_symbol, instrument.exchange_symbol
                    ),
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn serve(
    bind: String,
    exchange: Exchange,
    api_key: Option<String>,
    api_secret: Option<String>,
    webhook_secret: String,
    quote_currency: String,
    testnet: bool,
    symbols: Option<PathBuf>,
) -> Result<()> {
    let symbol_map = load_symbol_map(symbols)?;
    tracing::info!(symbols = symbol_map.len(), "symbol map loaded");

    let config = RelayConfig {
        webhook_secret,
        quote_currency,
    };
    if config.uses_default_secret() {
        tracing::warn!(
            "WEBHOOK_SECRET is the built-in default — anyone who reads the docs can trade \
             with your account; set a real secret before exposing this relay"
        );
    }

    let connector = build_connector(exchange, api_key, api_secret, testnet, &symbol_map)?;

    // Construct once, fail startup if credentials are invalid. The handle
    // is never rebuilt per request.
    let balance = connector
        .available_balance(&config.quote_currency)
        .await
        .with_context(|| format!("credential check against {} failed", connector.name()))?;
    tracing::info!(
        exchange = connector.name(),
        %balance,
        currency = %config.quote_currency,
        "exchange connector ready"
    );

    let state = Arc::new(AppState::new(connector, config, symbol_map));
    tradehook_relay::start_server(state, &bind).await
}

fn build_connector(
    exchange: Exchange,
    api_key: Option<String>,
    api_secret: Option<String>,
    testnet: bool,
    symbols: &SymbolMap,
) -> Result<Arc<dyn ExchangeConnector>> {
    match exchange {
        Exchange::Delta => {
            let (api_key, api_secret) = require_credentials(api_key, api_secret)?;
            Ok(Arc::new(DeltaConnector::new(DeltaConfig {
                api_key,
                api_secret,
                testnet,
            })))
        }
        Exchange::Bybit => {
            let (api_key, api_secret) = require_credentials(api_key, api_secret)?;
            Ok(Arc::new(BybitConnector::new(BybitConfig {
                api_key,
                api_secret,
                testnet,
            })))
        }
        Exchange::Simulated => {
            let mut sim = SimulatedExchange::new().with_balance(dec!(10000));
            for instrument in symbols.iter() {
                sim = sim.with_price(&instrument.alert_symbol, dec!(1000));
            }
            tracing::warn!("running against the simulated exchange; no real orders will be placed");
            Ok(Arc::new(sim))
        }
    }
}

fn require_credentials(
    api_key: Option<String>,
    api_secret: Option<String>,
) -> Result<(String, String)> {
    match (api_key, api_secret) {
        (Some(key), Some(secret)) => Ok((key, secret)),
        _ => anyhow::bail!("API_KEY and API_SECRET are required for this exchange"),
    }
}

fn load_symbol_map(path: Option<PathBuf>) -> Result<SymbolMap> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read symbol map {}", path.display()))?;
            SymbolMap::from_toml_str(&raw)
                .with_context(|| format!("failed to parse symbol map {}", path.display()))
        }
        None => Ok(SymbolMap::default()),
    }
}
