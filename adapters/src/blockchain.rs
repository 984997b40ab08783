//! Capability interface the on-chain reserve exposes to the core.
//!
//! The concrete client (RPC transport, signing, nonce handling, backup
//! endpoint fail-over) lives outside this workspace.

use std::collections::HashMap;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use common::{BalanceEntry, RateEntry, Token};

use crate::error::AdapterError;

/// Receipt outcome for a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// No receipt yet.
    Pending,
    Mined,
    Reverted,
}

#[async_trait]
pub trait Blockchain: Send + Sync {
    /// Transfer `amount` of `token` from the reserve to `destination`.
    async fn send(
        &self,
        token: &Token,
        amount: U256,
        destination: Address,
    ) -> Result<B256, AdapterError>;

    /// Publish new buy/sell rates to the pricing contract, effective at
    /// `block`. The three slices are index-aligned.
    async fn set_rates(
        &self,
        tokens: Vec<Address>,
        buys: Vec<U256>,
        sells: Vec<U256>,
        block: u64,
    ) -> Result<B256, AdapterError>;

    async fn tx_status(&self, tx: B256) -> Result<TxStatus, AdapterError>;

    async fn current_block(&self) -> Result<u64, AdapterError>;

    /// Batch read of base+compact rates from the wrapper contract, keyed by
    /// token id.
    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, AdapterError>;

    /// Reserve-held balances for every supported token, keyed by token id.
    async fn fetch_reserve_balances(&self) -> Result<HashMap<String, BalanceEntry>, AdapterError>;
}
