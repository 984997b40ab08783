//! Process-wide exchange registry, frozen at startup like the token
//! registry. The active set comes from the `RESERVE_EXCHANGES` environment
//! variable (comma-separated ids).

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

use common::ExchangeId;

use crate::exchange::Exchange;

pub const EXCHANGES_ENV: &str = "RESERVE_EXCHANGES";

static EXCHANGES: OnceCell<HashMap<String, Arc<dyn Exchange>>> = OnceCell::new();

#[derive(Debug, Error, PartialEq)]
pub enum ExchangeRegistryError {
    #[error("Exchange {0} is not supported")]
    UnknownExchange(String),
    #[error("exchange registry is already initialized")]
    AlreadyInitialized,
}

pub fn init_exchanges(
    exchanges: Vec<Arc<dyn Exchange>>,
) -> Result<(), ExchangeRegistryError> {
    let map = exchanges
        .into_iter()
        .map(|e| (e.id().as_str().to_string(), e))
        .collect();
    EXCHANGES
        .set(map)
        .map_err(|_| ExchangeRegistryError::AlreadyInitialized)
}

pub fn get_exchange(id: &str) -> Result<Arc<dyn Exchange>, ExchangeRegistryError> {
    EXCHANGES
        .get()
        .and_then(|m| m.get(id))
        .cloned()
        .ok_or_else(|| ExchangeRegistryError::UnknownExchange(id.to_string()))
}

pub fn supported_exchanges() -> Vec<Arc<dyn Exchange>> {
    let mut all: Vec<Arc<dyn Exchange>> = EXCHANGES
        .get()
        .map(|m| m.values().cloned().collect())
        .unwrap_or_default();
    all.sort_by_key(|e| e.id());
    all
}

/// Exchange ids enabled for this process, in declaration order.
pub fn active_exchange_ids() -> Vec<ExchangeId> {
    std::env::var(EXCHANGES_ENV)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ExchangeId::new)
        .collect()
}
