//! Capability interface a centralized exchange exposes to the core.
//!
//! Concrete clients live outside this workspace; the fetcher and the reserve
//! core only ever see this trait. Every network-touching method is expected
//! to be bounded by the shared client timeout (see [`crate::http_client`]).

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use common::exchange_info::ExchangeInfo;
use common::fees::ExchangeFees;
use common::{
    ActivityId, EBalanceEntry, ExchangeId, ExchangeStatus, PriceEntry, Token, TokenPair, TradeSide,
};

use crate::error::AdapterError;

/// One side of an order book fetch.
#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    pub bids: Vec<PriceEntry>,
    pub asks: Vec<PriceEntry>,
}

/// Outcome of a trade submission.
#[derive(Clone, Debug)]
pub struct TradeResult {
    /// Venue-assigned order id; becomes the activity's external id.
    pub id: String,
    pub done: f64,
    pub remaining: f64,
    pub finished: bool,
}

/// Venue's answer to a withdraw-status poll: the exchange-side status plus
/// the on-chain tx hash once the venue exposes it.
#[derive(Clone, Debug)]
pub struct WithdrawStatus {
    pub status: ExchangeStatus,
    pub tx: Option<B256>,
}

#[async_trait]
pub trait Exchange: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// Deposit address for `token`, or `None` when the venue does not accept
    /// deposits of it. The map is refreshed from configuration at startup.
    fn deposit_address(&self, token: &Token) -> Option<Address>;

    /// Pairs this venue is configured to serve.
    fn pairs(&self) -> Vec<TokenPair>;

    async fn fetch_order_book(&self, pair: &TokenPair) -> Result<OrderBook, AdapterError>;

    async fn trade(
        &self,
        side: TradeSide,
        base: &Token,
        quote: &Token,
        rate: f64,
        amount: f64,
        timepoint: u64,
    ) -> Result<TradeResult, AdapterError>;

    /// Submit a withdrawal to `destination`; returns the venue-side id.
    async fn withdraw(
        &self,
        token: &Token,
        amount: alloy_primitives::U256,
        destination: Address,
        timepoint: u64,
    ) -> Result<String, AdapterError>;

    async fn cancel_order(&self, id: &ActivityId) -> Result<(), AdapterError>;

    async fn order_status(
        &self,
        id: &ActivityId,
        timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError>;

    /// Status of an incoming deposit identified by its on-chain tx.
    async fn deposit_status(
        &self,
        id: &ActivityId,
        tx: B256,
        amount: f64,
        timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError>;

    async fn withdraw_status(
        &self,
        id: &ActivityId,
        amount: f64,
        timepoint: u64,
    ) -> Result<WithdrawStatus, AdapterError>;

    async fn fetch_balances(&self) -> Result<EBalanceEntry, AdapterError>;

    /// Precision/limit table, shared with concurrent readers.
    fn info(&self) -> Arc<ExchangeInfo>;

    /// Re-pull the precision/limit table from the venue.
    async fn refresh_precision(&self) -> Result<(), AdapterError>;

    fn fees(&self) -> ExchangeFees;
}
