pub mod activity;
pub mod auth;
pub mod exchange_info;
pub mod fees;
pub mod logger;
pub mod market;
pub mod registry;
pub mod time;
pub mod types;

pub use activity::{
    blockchain_pending, exchange_pending, status_pending, ActivityAction, ActivityId,
    ActivityIdError, ActivityRecord, ExchangeStatus, MiningStatus,
};
pub use market::{
    AllPriceEntry, AllRateEntry, AuthDataSnapshot, BalanceEntry, BalanceResponse, EBalanceEntry,
    ExchangePrice, OnePrice, PriceEntry, RateEntry, RateResponse, Version, Versioned,
};
pub use time::{now_ms, next_timepoint, Timestamp};
pub use types::{big_to_float, ExchangeId, Token, TokenPair, TokenPairId, TradeSide};
