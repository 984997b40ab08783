use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;

use adapters::{init_exchanges, Blockchain, Exchange};
use backend::{
    config::{AppConfig, ConfigError},
    core::ReserveCore,
    data::ReserveData,
    fetcher::Fetcher,
    http::{create_router, AppState},
    journal::{ActivityJournal, SqliteJournal},
    metric::SqliteMetricStorage,
    sim::{SimBlockchain, SimExchange},
};
use common::auth::HmacSigner;
use common::logger::init_tracing;
use common::registry::init_tokens;

#[derive(Debug, Parser)]
#[clap(name = "reserve-backend", version)]
struct Cli {
    /// Control-plane port.
    #[clap(long, short = 'p', default_value_t = 8000)]
    port: u16,

    /// Disable request authentication (development only).
    #[clap(long)]
    no_auth: bool,
}

/// Build the simulated venue set from `RESERVE_EXCHANGES`. Real deployments
/// swap in concrete clients here; everything downstream only sees the
/// capability traits.
fn build_exchanges(cfg: &AppConfig) -> Vec<Arc<dyn Exchange>> {
    let mut ids = adapters::active_exchange_ids();
    if ids.is_empty() {
        ids = vec![
            common::ExchangeId::new("binance"),
            common::ExchangeId::new("bittrex"),
        ];
    }
    ids.iter()
        .map(|id| {
            Arc::new(SimExchange::new(
                id.as_str(),
                alloy_primitives::Address::repeat_byte(0x44),
                cfg.tokens.clone(),
            )) as Arc<dyn Exchange>
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting reserve backend...");

    let cfg = AppConfig::from_env()?;

    init_tokens(cfg.tokens.clone())?;

    let exchanges = build_exchanges(&cfg);
    for exchange in &exchanges {
        exchange.refresh_precision().await?;
    }
    init_exchanges(exchanges.clone())?;

    let sqlite = Arc::new(SqliteJournal::connect(&cfg.database_url).await?);
    let journal: Arc<dyn ActivityJournal> = Arc::clone(&sqlite) as Arc<dyn ActivityJournal>;
    let metric = Arc::new(SqliteMetricStorage::new(sqlite.pool().clone()).await?);

    let blockchain: Arc<dyn Blockchain> = Arc::new(SimBlockchain::new(cfg.tokens.clone()));

    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&journal),
        Arc::clone(&blockchain),
        exchanges,
        cfg.fetcher,
    ));
    fetcher.restore().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tickers = Arc::clone(&fetcher).start(shutdown_rx);

    let signer = if cli.no_auth {
        None
    } else {
        if cfg.auth_secret.is_empty() {
            return Err(ConfigError::MissingSecret.into());
        }
        Some(HmacSigner::new(cfg.auth_secret.clone()))
    };

    let state = Arc::new(AppState {
        data: ReserveData::new(fetcher.store(), Arc::clone(&journal)),
        core: ReserveCore::new(blockchain, journal, cfg.reserve_address),
        metric,
        signer,
    });

    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cli.port)).await?;
    tracing::info!(host = %cfg.host, port = cli.port, "control plane listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Stop the tickers at their next suspension point and let them drain.
    let _ = shutdown_tx.send(true);
    for ticker in tickers {
        let _ = ticker.await;
    }

    Ok(())
}
