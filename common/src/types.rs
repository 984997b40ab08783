use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A token known to the reserve. Immutable after configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub address: Address,
    pub decimals: u32,
}

impl Token {
    pub fn new(id: impl Into<String>, address: Address, decimals: u32) -> Self {
        Self {
            id: id.into(),
            address,
            decimals,
        }
    }
}

/// `"BASE-QUOTE"` identifier. Derived from the two token ids; carries no
/// identity of its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenPairId(String);

impl TokenPairId {
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!("{}-{}", base, quote))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenPairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pair of registered tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub base: Token,
    pub quote: Token,
}

impl TokenPair {
    pub fn pair_id(&self) -> TokenPairId {
        TokenPairId::new(&self.base.id, &self.quote.id)
    }
}

/// Opaque short exchange identifier, e.g. `"binance"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Trade type of {0} is not supported.")]
pub struct UnsupportedTradeSide(pub String);

impl FromStr for TradeSide {
    type Err = UnsupportedTradeSide;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(UnsupportedTradeSide(other.to_string())),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lossy conversion of a raw token quantity to a float at the token's scale.
pub fn big_to_float(value: U256, decimals: u32) -> f64 {
    let raw = value.to_string().parse::<f64>().unwrap_or(f64::INFINITY);
    raw / 10f64.powi(decimals as i32)
}
