//! Read facade: serves the fetcher's last-published snapshots and the
//! journal's records to the HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use common::registry::get_token;
use common::{
    ActivityRecord, AllPriceEntry, BalanceResponse, EBalanceEntry, ExchangeId, OnePrice,
    RateResponse, Timestamp, TokenPairId, Version, Versioned,
};

use crate::fetcher::store::SnapshotStore;
use crate::journal::{ActivityJournal, StorageError};

#[derive(Error, Debug)]
pub enum DataError {
    #[error("no {0} snapshot has been published yet")]
    NotReady(&'static str),

    #[error("Token pair is not supported")]
    UnsupportedPair,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone, Debug, Serialize)]
pub struct OnePriceView {
    pub version: Version,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub block: u64,
    pub data: OnePrice,
}

#[derive(Clone, Debug, Serialize)]
pub struct RatesView {
    pub version: Version,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub valid: bool,
    pub error: String,
    pub data: HashMap<String, RateResponse>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthDataView {
    pub version: Version,
    pub timestamp: Timestamp,
    pub return_time: Timestamp,
    pub valid: bool,
    pub error: String,
    pub exchange_balances: HashMap<ExchangeId, EBalanceEntry>,
    pub reserve_balances: HashMap<String, BalanceResponse>,
    pub pending_activities: Vec<ActivityRecord>,
    pub block: u64,
}

pub struct ReserveData {
    store: Arc<SnapshotStore>,
    journal: Arc<dyn ActivityJournal>,
}

impl ReserveData {
    pub fn new(store: Arc<SnapshotStore>, journal: Arc<dyn ActivityJournal>) -> Self {
        Self { store, journal }
    }

    /// Latest price snapshot. The `timepoint` is accepted for forward
    /// compatibility; the served snapshot is always the newest one.
    pub fn get_all_prices(
        &self,
        _timepoint: u64,
    ) -> Result<Arc<Versioned<AllPriceEntry>>, DataError> {
        self.store.price.latest().ok_or(DataError::NotReady("price"))
    }

    pub fn get_one_price(
        &self,
        pair: &TokenPairId,
        timepoint: u64,
    ) -> Result<OnePriceView, DataError> {
        let snapshot = self.get_all_prices(timepoint)?;
        let data = snapshot
            .data
            .data
            .get(pair)
            .cloned()
            .ok_or(DataError::UnsupportedPair)?;
        Ok(OnePriceView {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            return_time: snapshot.return_time,
            block: snapshot.data.block,
            data,
        })
    }

    pub fn get_all_rates(&self, _timepoint: u64) -> Result<RatesView, DataError> {
        let snapshot = self.store.rate.latest().ok_or(DataError::NotReady("rate"))?;
        let data = snapshot
            .data
            .data
            .iter()
            .map(|(token, entry)| (token.clone(), entry.to_response()))
            .collect();
        Ok(RatesView {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            return_time: snapshot.return_time,
            valid: snapshot.data.valid,
            error: snapshot.data.error.clone(),
            data,
        })
    }

    pub fn get_auth_data(&self, _timepoint: u64) -> Result<AuthDataView, DataError> {
        let snapshot = self.store.auth.latest().ok_or(DataError::NotReady("auth"))?;
        let reserve_balances = snapshot
            .data
            .reserve_balances
            .iter()
            .map(|(token_id, entry)| {
                let decimals = get_token(token_id).map(|t| t.decimals).unwrap_or(18);
                (token_id.clone(), entry.to_response(decimals))
            })
            .collect();
        Ok(AuthDataView {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            return_time: snapshot.return_time,
            valid: snapshot.data.valid,
            error: snapshot.data.error.clone(),
            exchange_balances: snapshot.data.exchange_balances.clone(),
            reserve_balances,
            pending_activities: snapshot.data.pending_activities.clone(),
            block: snapshot.data.block,
        })
    }

    pub async fn get_records(&self) -> Result<Vec<ActivityRecord>, DataError> {
        Ok(self.journal.scan_all().await?)
    }

    pub async fn get_pending_activities(&self) -> Result<Vec<ActivityRecord>, DataError> {
        Ok(self.journal.scan_pending().await?)
    }
}
