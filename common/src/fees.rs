use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fee fraction per operation kind, e.g. `{"taker": 0.001, "maker": 0.001}`.
pub type TradingFee = HashMap<String, f64>;

/// Per-token withdraw/deposit fees.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FundingFee {
    pub withdraw: HashMap<String, f64>,
    pub deposit: HashMap<String, f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExchangeFees {
    pub trading: TradingFee,
    pub funding: FundingFee,
}

impl ExchangeFees {
    pub fn new(trading: TradingFee, funding: FundingFee) -> Self {
        Self { trading, funding }
    }
}
