//! Periodic, multi-source state collection.
//!
//! Four independent tickers (order books, auth data, on-chain rates, block
//! height) each run as one long-lived task with a skip-on-overrun interval:
//! tick work is awaited inline, so at most one execution per ticker is ever
//! in flight and a slow venue delays only its own ticker. Per-exchange work
//! inside a tick fans out into a `JoinSet` and joins before publishing.
//!
//! The auth tick is the only path that advances activity statuses.

pub mod store;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use adapters::{Blockchain, Exchange, TxStatus};
use common::{
    now_ms, ActivityAction, ActivityId, ActivityRecord, AllPriceEntry, AllRateEntry,
    AuthDataSnapshot, EBalanceEntry, ExchangeId, ExchangePrice, ExchangeStatus, MiningStatus,
    OnePrice, TokenPairId, Versioned,
};

use crate::journal::{ActivityJournal, SnapshotKind, StorageError};
use store::SnapshotStore;

#[derive(Clone, Copy, Debug)]
pub struct FetcherConfig {
    pub price_period: Duration,
    pub auth_period: Duration,
    pub rate_period: Duration,
    pub block_period: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            price_period: Duration::from_secs(3),
            auth_period: Duration::from_secs(2),
            rate_period: Duration::from_secs(3),
            block_period: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TickKind {
    Price,
    Auth,
    Rate,
    Block,
}

impl TickKind {
    fn name(&self) -> &'static str {
        match self {
            TickKind::Price => "price",
            TickKind::Auth => "auth",
            TickKind::Rate => "rate",
            TickKind::Block => "block",
        }
    }
}

/// New exchange-side state for one pending activity, plus the on-chain tx
/// once a venue reports it for a withdraw.
struct LegUpdate {
    status: ExchangeStatus,
    tx: Option<B256>,
}

pub struct Fetcher {
    journal: Arc<dyn ActivityJournal>,
    blockchain: Arc<dyn Blockchain>,
    exchanges: Vec<Arc<dyn Exchange>>,
    store: Arc<SnapshotStore>,
    block: Arc<AtomicU64>,
    cfg: FetcherConfig,
}

impl Fetcher {
    pub fn new(
        journal: Arc<dyn ActivityJournal>,
        blockchain: Arc<dyn Blockchain>,
        exchanges: Vec<Arc<dyn Exchange>>,
        cfg: FetcherConfig,
    ) -> Self {
        Self {
            journal,
            blockchain,
            exchanges,
            store: Arc::new(SnapshotStore::new()),
            block: Arc::new(AtomicU64::new(0)),
            cfg,
        }
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    pub fn current_block(&self) -> u64 {
        self.block.load(Ordering::Relaxed)
    }

    /// Seed the in-memory store from the journal so a restarted process can
    /// serve the last published view before the first tick lands.
    pub async fn restore(&self) -> Result<(), StorageError> {
        if let Some(blob) = self.journal.get_snapshot(SnapshotKind::Price).await? {
            match serde_json::from_str::<Versioned<AllPriceEntry>>(&blob) {
                Ok(snapshot) => self.store.price.restore(snapshot),
                Err(e) => warn!(target: "fetcher", error = %e, "discarding persisted price snapshot"),
            }
        }
        if let Some(blob) = self.journal.get_snapshot(SnapshotKind::Rate).await? {
            match serde_json::from_str::<Versioned<AllRateEntry>>(&blob) {
                Ok(snapshot) => self.store.rate.restore(snapshot),
                Err(e) => warn!(target: "fetcher", error = %e, "discarding persisted rate snapshot"),
            }
        }
        if let Some(blob) = self.journal.get_snapshot(SnapshotKind::Auth).await? {
            match serde_json::from_str::<Versioned<AuthDataSnapshot>>(&blob) {
                Ok(snapshot) => self.store.auth.restore(snapshot),
                Err(e) => warn!(target: "fetcher", error = %e, "discarding persisted auth snapshot"),
            }
        }
        Ok(())
    }

    /// Spawn the four ticker tasks. They stop at the next suspension point
    /// after `shutdown` flips.
    pub fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        [
            (TickKind::Price, self.cfg.price_period),
            (TickKind::Auth, self.cfg.auth_period),
            (TickKind::Rate, self.cfg.rate_period),
            (TickKind::Block, self.cfg.block_period),
        ]
        .into_iter()
        .map(|(kind, period)| {
            let fetcher = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(fetcher.run_ticker(kind, period, shutdown))
        })
        .collect()
    }

    async fn run_ticker(
        self: Arc<Self>,
        kind: TickKind,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.tick(kind) => {
                    if let Err(e) = outcome {
                        warn!(target: "fetcher", ticker = kind.name(), error = %e, "tick failed");
                    }
                }
            }
        }
        debug!(target: "fetcher", ticker = kind.name(), "ticker stopped");
    }

    async fn tick(&self, kind: TickKind) -> Result<(), StorageError> {
        match kind {
            TickKind::Price => self.price_tick().await,
            TickKind::Auth => self.auth_tick().await,
            TickKind::Rate => self.rate_tick().await,
            TickKind::Block => self.block_tick().await,
        }
    }

    /// Order-book sweep over every `(exchange, pair)` combination.
    pub async fn price_tick(&self) -> Result<(), StorageError> {
        let timestamp = now_ms();
        let block = self.block.load(Ordering::Relaxed);

        let mut set = JoinSet::new();
        for exchange in &self.exchanges {
            for pair in exchange.pairs() {
                let exchange = Arc::clone(exchange);
                set.spawn(async move {
                    let requested = now_ms();
                    let book = exchange.fetch_order_book(&pair).await;
                    (exchange.id(), pair.pair_id(), requested, now_ms(), book)
                });
            }
        }

        let mut data: HashMap<TokenPairId, OnePrice> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            let Ok((exchange_id, pair_id, requested, returned, book)) = joined else {
                continue;
            };
            let entry = match book {
                Ok(book) => ExchangePrice {
                    valid: true,
                    error: String::new(),
                    timestamp: requested,
                    return_time: returned,
                    bids: book.bids,
                    asks: book.asks,
                },
                Err(e) => ExchangePrice {
                    valid: false,
                    error: e.to_string(),
                    timestamp: requested,
                    return_time: returned,
                    bids: Vec::new(),
                    asks: Vec::new(),
                },
            };
            data.entry(pair_id).or_default().insert(exchange_id, entry);
        }

        let version = self.store.price.next_version();
        let snapshot = Arc::new(Versioned {
            version,
            timestamp,
            return_time: now_ms(),
            data: AllPriceEntry { block, data },
        });
        self.store.price.publish(Arc::clone(&snapshot));
        self.journal
            .put_snapshot(SnapshotKind::Price, &serde_json::to_string(&*snapshot)?)
            .await
    }

    /// Balance reconciliation plus the pending-activity lifecycle. This is
    /// the only place statuses advance.
    pub async fn auth_tick(&self) -> Result<(), StorageError> {
        let timestamp = now_ms();
        let pending = self.journal.scan_pending().await?;

        // Exchange fan-out: account balances and exchange-leg statuses.
        let mut set = JoinSet::new();
        for exchange in &self.exchanges {
            let exchange = Arc::clone(exchange);
            let work: Vec<ActivityRecord> = pending
                .iter()
                .filter(|a| {
                    a.destination == exchange.id().as_str() && a.is_exchange_pending()
                })
                .cloned()
                .collect();
            set.spawn(async move {
                let requested = now_ms();
                let balances = match exchange.fetch_balances().await {
                    Ok(mut entry) => {
                        entry.valid = true;
                        entry.error.clear();
                        entry.timestamp = requested;
                        entry.return_time = now_ms();
                        entry
                    }
                    Err(e) => EBalanceEntry {
                        valid: false,
                        error: e.to_string(),
                        timestamp: requested,
                        return_time: now_ms(),
                        ..Default::default()
                    },
                };
                let mut updates = Vec::new();
                for activity in &work {
                    updates.push((
                        activity.id.clone(),
                        exchange_leg_status(exchange.as_ref(), activity).await,
                    ));
                }
                (exchange.id(), balances, updates)
            });
        }

        // Receipt poll runs alongside the venue fan-out.
        let blockchain = Arc::clone(&self.blockchain);
        let chain_work: Vec<ActivityRecord> = pending
            .iter()
            .filter(|a| a.is_blockchain_pending())
            .cloned()
            .collect();
        let mining_task = tokio::spawn(async move {
            let mut updates: Vec<(ActivityId, MiningStatus)> = Vec::new();
            for activity in &chain_work {
                let Some(tx) = activity.result_str("tx").filter(|t| !t.is_empty()) else {
                    continue;
                };
                let Ok(tx) = tx.parse::<B256>() else {
                    warn!(target: "fetcher", id = %activity.id, "unparsable tx hash on activity");
                    continue;
                };
                match blockchain.tx_status(tx).await {
                    Ok(TxStatus::Mined) => updates.push((activity.id.clone(), MiningStatus::Mined)),
                    Ok(TxStatus::Reverted) => {
                        updates.push((activity.id.clone(), MiningStatus::Failed))
                    }
                    Ok(TxStatus::Pending) => {}
                    Err(e) => {
                        warn!(target: "fetcher", id = %activity.id, error = %e, "receipt poll failed")
                    }
                }
            }
            updates
        });

        let mut exchange_balances: HashMap<ExchangeId, EBalanceEntry> = HashMap::new();
        let mut leg_updates: HashMap<ActivityId, LegUpdate> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            let Ok((exchange_id, balances, updates)) = joined else {
                continue;
            };
            exchange_balances.insert(exchange_id, balances);
            for (id, update) in updates {
                leg_updates.insert(id, update);
            }
        }
        let mining_updates: HashMap<ActivityId, MiningStatus> = mining_task
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

        // Apply transitions. Withdraw tx hashes land before the status write
        // so the next receipt poll sees them.
        for activity in &pending {
            let leg = leg_updates.get(&activity.id);
            if let Some(LegUpdate { tx: Some(tx), .. }) = leg {
                if activity.action == ActivityAction::Withdraw
                    && activity.result_str("tx").map_or(true, str::is_empty)
                {
                    self.journal
                        .fill_withdraw_tx(&activity.id, &tx.to_string())
                        .await?;
                }
            }
            let new_exchange = leg.map_or(activity.exchange_status, |l| l.status);
            let new_mining = mining_updates
                .get(&activity.id)
                .copied()
                .unwrap_or(activity.mining_status);
            if new_exchange != activity.exchange_status || new_mining != activity.mining_status {
                debug!(
                    target: "fetcher",
                    id = %activity.id,
                    from_exchange = activity.exchange_status.as_str(),
                    to_exchange = new_exchange.as_str(),
                    from_mining = activity.mining_status.as_str(),
                    to_mining = new_mining.as_str(),
                    "activity transition"
                );
                self.journal
                    .update_status(&activity.id, new_exchange, new_mining)
                    .await?;
            }
        }

        let (valid, error, reserve_balances) = match self.blockchain.fetch_reserve_balances().await
        {
            Ok(balances) => (true, String::new(), balances),
            Err(e) => (false, e.to_string(), HashMap::new()),
        };

        // Re-read the pending set after the transitions above so the
        // snapshot is internally consistent.
        let pending_activities = self.journal.scan_pending().await?;

        let version = self.store.auth.next_version();
        let snapshot = Arc::new(Versioned {
            version,
            timestamp,
            return_time: now_ms(),
            data: AuthDataSnapshot {
                valid,
                error,
                exchange_balances,
                reserve_balances,
                pending_activities,
                block: self.block.load(Ordering::Relaxed),
            },
        });
        self.store.auth.publish(Arc::clone(&snapshot));
        self.journal
            .put_snapshot(SnapshotKind::Auth, &serde_json::to_string(&*snapshot)?)
            .await
    }

    /// Batch read of base+compact rates from the wrapper.
    pub async fn rate_tick(&self) -> Result<(), StorageError> {
        let timestamp = now_ms();
        let data = match self.blockchain.fetch_rates().await {
            Ok(data) => AllRateEntry {
                valid: true,
                error: String::new(),
                data,
            },
            Err(e) => AllRateEntry {
                valid: false,
                error: e.to_string(),
                data: HashMap::new(),
            },
        };

        let version = self.store.rate.next_version();
        let snapshot = Arc::new(Versioned {
            version,
            timestamp,
            return_time: now_ms(),
            data,
        });
        self.store.rate.publish(Arc::clone(&snapshot));
        self.journal
            .put_snapshot(SnapshotKind::Rate, &serde_json::to_string(&*snapshot)?)
            .await
    }

    pub async fn block_tick(&self) -> Result<(), StorageError> {
        match self.blockchain.current_block().await {
            Ok(block) => self.block.store(block, Ordering::Relaxed),
            Err(e) => warn!(target: "fetcher", error = %e, "block height fetch failed"),
        }
        Ok(())
    }
}

/// Poll the venue for one pending activity's exchange-leg status. Adapter
/// failures leave the stored status untouched; the next tick retries.
async fn exchange_leg_status(exchange: &dyn Exchange, activity: &ActivityRecord) -> LegUpdate {
    let unchanged = LegUpdate {
        status: activity.exchange_status,
        tx: None,
    };
    match activity.action {
        ActivityAction::Trade => {
            match exchange.order_status(&activity.id, activity.timestamp).await {
                Ok(status) => LegUpdate { status, tx: None },
                Err(e) => {
                    warn!(target: "fetcher", id = %activity.id, error = %e, "order status poll failed");
                    unchanged
                }
            }
        }
        ActivityAction::Deposit => {
            let tx = activity
                .result_str("tx")
                .and_then(|t| t.parse::<B256>().ok())
                .unwrap_or(B256::ZERO);
            let amount = activity
                .param_str("amount")
                .and_then(|a| a.parse::<f64>().ok())
                .unwrap_or(0.0);
            match exchange
                .deposit_status(&activity.id, tx, amount, activity.timestamp)
                .await
            {
                Ok(status) => LegUpdate { status, tx: None },
                Err(e) => {
                    warn!(target: "fetcher", id = %activity.id, error = %e, "deposit status poll failed");
                    unchanged
                }
            }
        }
        ActivityAction::Withdraw => {
            let amount = activity
                .param_str("amount")
                .and_then(|a| a.parse::<f64>().ok())
                .unwrap_or(0.0);
            match exchange
                .withdraw_status(&activity.id, amount, activity.timestamp)
                .await
            {
                Ok(status) => LegUpdate {
                    status: status.status,
                    tx: status.tx,
                },
                Err(e) => {
                    warn!(target: "fetcher", id = %activity.id, error = %e, "withdraw status poll failed");
                    unchanged
                }
            }
        }
        // On-chain-only activities have no exchange leg to poll.
        ActivityAction::SetRates => unchanged,
    }
}
