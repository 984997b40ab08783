//! Read-model payloads published by the fetcher.
//!
//! Each snapshot kind is an immutable value; the fetcher publishes a new one
//! per tick and readers only ever observe whole snapshots.

use std::collections::HashMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::activity::ActivityRecord;
use crate::time::Timestamp;
use crate::types::{big_to_float, ExchangeId, TokenPairId};

pub type Version = u64;

/// Version/timing wrapper shared by every published snapshot kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: Version,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub data: T,
}

/// One order-book level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub quantity: f64,
    pub rate: f64,
}

/// Order book as reported by a single exchange for a single pair. On fetch
/// failure `valid` is false and `error` carries the adapter message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangePrice {
    pub valid: bool,
    pub error: String,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub bids: Vec<PriceEntry>,
    pub asks: Vec<PriceEntry>,
}

pub type OnePrice = HashMap<ExchangeId, ExchangePrice>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AllPriceEntry {
    pub block: u64,
    pub data: HashMap<TokenPairId, OnePrice>,
}

/// On-chain rate for one token: a base rate in twei plus a signed 8-bit
/// compact delta. Effective rate is `base * (1 + compact/1000)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateEntry {
    pub base_buy: U256,
    pub compact_buy: i8,
    pub base_sell: U256,
    pub compact_sell: i8,
    pub block: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AllRateEntry {
    pub valid: bool,
    pub error: String,
    pub data: HashMap<String, RateEntry>,
}

/// Float view of a [`RateEntry`] served over HTTP; bases are scaled by 1e18.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateResponse {
    pub base_buy: f64,
    pub compact_buy: i8,
    pub base_sell: f64,
    pub compact_sell: i8,
    pub block: u64,
}

pub const RATE_DECIMALS: u32 = 18;

impl RateEntry {
    pub fn to_response(&self) -> RateResponse {
        RateResponse {
            base_buy: big_to_float(self.base_buy, RATE_DECIMALS),
            compact_buy: self.compact_buy,
            base_sell: big_to_float(self.base_sell, RATE_DECIMALS),
            compact_sell: self.compact_sell,
            block: self.block,
        }
    }
}

/// Reserve-side balance of one token, raw at token scale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub valid: bool,
    pub error: String,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub balance: U256,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub valid: bool,
    pub error: String,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub balance: f64,
}

impl BalanceEntry {
    pub fn to_response(&self, decimals: u32) -> BalanceResponse {
        BalanceResponse {
            valid: self.valid,
            error: self.error.clone(),
            timestamp: self.timestamp,
            return_time: self.return_time,
            balance: big_to_float(self.balance, decimals),
        }
    }
}

/// Per-exchange account balances: available, locked in open orders, and
/// in-flight deposits, keyed by token id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EBalanceEntry {
    pub valid: bool,
    pub error: String,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub available: HashMap<String, f64>,
    pub locked: HashMap<String, f64>,
    pub deposit: HashMap<String, f64>,
}

/// The one snapshot the strategy needs for authenticated decisions. Must be
/// internally consistent: the pending set is re-read after status updates in
/// the same tick that fetched the balances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthDataSnapshot {
    pub valid: bool,
    pub error: String,
    pub exchange_balances: HashMap<ExchangeId, EBalanceEntry>,
    pub reserve_balances: HashMap<String, BalanceEntry>,
    pub pending_activities: Vec<ActivityRecord>,
    pub block: u64,
}
