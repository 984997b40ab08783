use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TokenPairId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairPrecision {
    pub amount: u32,
    pub price: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountLimit {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLimit {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairPrecisionLimit {
    pub precision: PairPrecision,
    pub amount_limit: AmountLimit,
    pub price_limit: PriceLimit,
}

#[derive(Debug, Error, PartialEq)]
#[error("Token pair {0} is not known to this exchange")]
pub struct UnknownPair(pub TokenPairId);

/// Per-exchange precision/limit table. Refreshed at startup and on demand
/// while handlers read it concurrently, so access goes through a RW lock.
#[derive(Default)]
pub struct ExchangeInfo {
    data: RwLock<HashMap<TokenPairId, PairPrecisionLimit>>,
}

impl ExchangeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, pair: TokenPairId, info: PairPrecisionLimit) {
        self.data.write().insert(pair, info);
    }

    pub fn get(&self, pair: &TokenPairId) -> Result<PairPrecisionLimit, UnknownPair> {
        self.data
            .read()
            .get(pair)
            .copied()
            .ok_or_else(|| UnknownPair(pair.clone()))
    }

    pub fn all(&self) -> HashMap<TokenPairId, PairPrecisionLimit> {
        self.data.read().clone()
    }
}
