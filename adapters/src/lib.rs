pub mod blockchain;
pub mod error;
pub mod exchange;
pub mod registry;

use std::time::Duration;

pub use blockchain::{Blockchain, TxStatus};
pub use error::AdapterError;
pub use exchange::{Exchange, OrderBook, TradeResult, WithdrawStatus};
pub use registry::{
    active_exchange_ids, get_exchange, init_exchanges, supported_exchanges, ExchangeRegistryError,
    EXCHANGES_ENV,
};

/// Per-request deadline every concrete adapter is expected to honor.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client builder for concrete adapter implementations; bounds
/// every in-flight request so a stalled venue cannot wedge a ticker.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AdapterError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .build()?;
    Ok(client)
}
