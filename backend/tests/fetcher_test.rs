//! Fetcher tests: the auth-tick status ladder against scripted adapters,
//! snapshot version monotonicity, and the skip-on-overrun ticker behavior.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use adapters::{
    AdapterError, Blockchain, Exchange, OrderBook, TradeResult, TxStatus, WithdrawStatus,
};
use backend::core::ReserveCore;
use backend::fetcher::{Fetcher, FetcherConfig};
use backend::journal::{ActivityJournal, SqliteJournal};
use common::exchange_info::ExchangeInfo;
use common::fees::ExchangeFees;
use common::{
    ActivityId, BalanceEntry, EBalanceEntry, ExchangeId, ExchangeStatus, MiningStatus, PriceEntry,
    RateEntry, Token, TokenPair, TradeSide,
};

fn eth() -> Token {
    Token::new("ETH", Address::repeat_byte(0xEE), 18)
}

fn knc() -> Token {
    Token::new("KNC", Address::repeat_byte(0x01), 18)
}

/// Venue double whose status answers are scripted per poll; the last script
/// entry repeats once the queue drains.
struct ScriptedExchange {
    id: ExchangeId,
    order_book_delay: Duration,
    deposit_script: Mutex<VecDeque<ExchangeStatus>>,
    withdraw_script: Mutex<VecDeque<WithdrawStatus>>,
    order_script: Mutex<VecDeque<ExchangeStatus>>,
}

impl ScriptedExchange {
    fn new(id: &str) -> Self {
        Self {
            id: ExchangeId::new(id),
            order_book_delay: Duration::ZERO,
            deposit_script: Mutex::new(VecDeque::new()),
            withdraw_script: Mutex::new(VecDeque::new()),
            order_script: Mutex::new(VecDeque::new()),
        }
    }

    fn script_deposit(&self, statuses: &[ExchangeStatus]) {
        self.deposit_script.lock().extend(statuses.iter().copied());
    }

    fn script_withdraw(&self, statuses: Vec<WithdrawStatus>) {
        self.withdraw_script.lock().extend(statuses);
    }

    fn script_order(&self, statuses: &[ExchangeStatus]) {
        self.order_script.lock().extend(statuses.iter().copied());
    }
}

fn pop_or_last<T: Clone>(queue: &mut VecDeque<T>, fallback: T) -> T {
    if queue.len() > 1 {
        queue.pop_front().unwrap_or(fallback)
    } else {
        queue.front().cloned().unwrap_or(fallback)
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    fn id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn deposit_address(&self, _token: &Token) -> Option<Address> {
        Some(Address::repeat_byte(0x44))
    }

    fn pairs(&self) -> Vec<TokenPair> {
        vec![TokenPair {
            base: knc(),
            quote: eth(),
        }]
    }

    async fn fetch_order_book(&self, _pair: &TokenPair) -> Result<OrderBook, AdapterError> {
        if !self.order_book_delay.is_zero() {
            tokio::time::sleep(self.order_book_delay).await;
        }
        Ok(OrderBook {
            bids: vec![PriceEntry {
                quantity: 10.0,
                rate: 0.009,
            }],
            asks: vec![PriceEntry {
                quantity: 10.0,
                rate: 0.011,
            }],
        })
    }

    async fn trade(
        &self,
        _side: TradeSide,
        _base: &Token,
        _quote: &Token,
        _rate: f64,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<TradeResult, AdapterError> {
        Err(AdapterError::Unsupported("not scripted".to_string()))
    }

    async fn withdraw(
        &self,
        _token: &Token,
        _amount: U256,
        _destination: Address,
        _timepoint: u64,
    ) -> Result<String, AdapterError> {
        Ok("w-1".to_string())
    }

    async fn cancel_order(&self, _id: &ActivityId) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn order_status(
        &self,
        _id: &ActivityId,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(pop_or_last(
            &mut self.order_script.lock(),
            ExchangeStatus::Submitted,
        ))
    }

    async fn deposit_status(
        &self,
        _id: &ActivityId,
        _tx: B256,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(pop_or_last(
            &mut self.deposit_script.lock(),
            ExchangeStatus::Unset,
        ))
    }

    async fn withdraw_status(
        &self,
        _id: &ActivityId,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<WithdrawStatus, AdapterError> {
        Ok(pop_or_last(
            &mut self.withdraw_script.lock(),
            WithdrawStatus {
                status: ExchangeStatus::Submitted,
                tx: None,
            },
        ))
    }

    async fn fetch_balances(&self) -> Result<EBalanceEntry, AdapterError> {
        Ok(EBalanceEntry {
            available: HashMap::from([("ETH".to_string(), 50.0)]),
            ..Default::default()
        })
    }

    fn info(&self) -> Arc<ExchangeInfo> {
        Arc::new(ExchangeInfo::new())
    }

    async fn refresh_precision(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn fees(&self) -> ExchangeFees {
        ExchangeFees::default()
    }
}

/// Chain double with per-tx scripted receipts.
struct ScriptedChain {
    receipts: Mutex<HashMap<B256, TxStatus>>,
    block: Mutex<u64>,
}

impl ScriptedChain {
    fn new() -> Self {
        Self {
            receipts: Mutex::new(HashMap::new()),
            block: Mutex::new(7),
        }
    }

    fn set_receipt(&self, tx: B256, status: TxStatus) {
        self.receipts.lock().insert(tx, status);
    }
}

#[async_trait]
impl Blockchain for ScriptedChain {
    async fn send(
        &self,
        _token: &Token,
        _amount: U256,
        _destination: Address,
    ) -> Result<B256, AdapterError> {
        Ok(B256::repeat_byte(0x11))
    }

    async fn set_rates(
        &self,
        _tokens: Vec<Address>,
        _buys: Vec<U256>,
        _sells: Vec<U256>,
        _block: u64,
    ) -> Result<B256, AdapterError> {
        Ok(B256::repeat_byte(0x22))
    }

    async fn tx_status(&self, tx: B256) -> Result<TxStatus, AdapterError> {
        Ok(self
            .receipts
            .lock()
            .get(&tx)
            .copied()
            .unwrap_or(TxStatus::Pending))
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        Ok(*self.block.lock())
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, AdapterError> {
        Ok(HashMap::from([(
            "KNC".to_string(),
            RateEntry {
                base_buy: U256::from(10u64).pow(U256::from(19)),
                compact_buy: 0,
                base_sell: U256::from(9u64) * U256::from(10u64).pow(U256::from(18)),
                compact_sell: 0,
                block: 7,
            },
        )]))
    }

    async fn fetch_reserve_balances(&self) -> Result<HashMap<String, BalanceEntry>, AdapterError> {
        Ok(HashMap::new())
    }
}

struct Rig {
    fetcher: Arc<Fetcher>,
    journal: Arc<SqliteJournal>,
    exchange: Arc<ScriptedExchange>,
    chain: Arc<ScriptedChain>,
    core: ReserveCore,
}

async fn rig(exchange: ScriptedExchange) -> Rig {
    let journal = Arc::new(SqliteJournal::in_memory().await.unwrap());
    let exchange = Arc::new(exchange);
    let chain = Arc::new(ScriptedChain::new());
    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&journal) as Arc<dyn ActivityJournal>,
        Arc::clone(&chain) as Arc<dyn Blockchain>,
        vec![Arc::clone(&exchange) as Arc<dyn Exchange>],
        FetcherConfig::default(),
    ));
    let core = ReserveCore::new(
        Arc::clone(&chain) as Arc<dyn Blockchain>,
        Arc::clone(&journal) as Arc<dyn ActivityJournal>,
        Address::repeat_byte(0x99),
    );
    Rig {
        fetcher,
        journal,
        exchange,
        chain,
        core,
    }
}

#[tokio::test]
async fn deposit_walks_pending_then_done() {
    let exchange = ScriptedExchange::new("binance");
    exchange.script_deposit(&[
        ExchangeStatus::Pending,
        ExchangeStatus::Done,
        ExchangeStatus::Done,
    ]);
    let r = rig(exchange).await;

    let id = r
        .core
        .deposit(
            Arc::clone(&r.exchange) as Arc<dyn Exchange>,
            eth(),
            U256::from(10u64).pow(U256::from(18)),
            1_000,
        )
        .await
        .unwrap();
    r.chain.set_receipt(B256::repeat_byte(0x11), TxStatus::Mined);

    // Tick 1: venue sees the transfer, receipt arrives.
    r.fetcher.auth_tick().await.unwrap();
    let record = &r.journal.scan_pending().await.unwrap()[0];
    assert_eq!(record.exchange_status, ExchangeStatus::Pending);
    assert_eq!(record.mining_status, MiningStatus::Mined);

    // Tick 2: venue credits the deposit; activity goes terminal.
    r.fetcher.auth_tick().await.unwrap();
    assert!(r.journal.scan_pending().await.unwrap().is_empty());
    let all = r.journal.scan_all().await.unwrap();
    let record = all.iter().find(|a| a.id == id).unwrap();
    assert_eq!(record.exchange_status, ExchangeStatus::Done);
    assert_eq!(record.mining_status, MiningStatus::Mined);
}

#[tokio::test]
async fn reverted_deposit_tx_fails_the_activity() {
    let exchange = ScriptedExchange::new("binance");
    let r = rig(exchange).await;

    r.core
        .deposit(
            Arc::clone(&r.exchange) as Arc<dyn Exchange>,
            eth(),
            U256::from(1u64),
            1_000,
        )
        .await
        .unwrap();
    r.chain
        .set_receipt(B256::repeat_byte(0x11), TxStatus::Reverted);

    r.fetcher.auth_tick().await.unwrap();

    assert!(r.journal.scan_pending().await.unwrap().is_empty());
    let all = r.journal.scan_all().await.unwrap();
    assert_eq!(all[0].mining_status, MiningStatus::Failed);
}

#[tokio::test]
async fn withdraw_tx_is_filled_then_receipt_resolves_it() {
    let exchange = ScriptedExchange::new("binance");
    let venue_tx = B256::repeat_byte(0xCD);
    exchange.script_withdraw(vec![
        WithdrawStatus {
            status: ExchangeStatus::Done,
            tx: Some(venue_tx),
        },
        WithdrawStatus {
            status: ExchangeStatus::Done,
            tx: Some(venue_tx),
        },
    ]);
    let r = rig(exchange).await;

    let id = r
        .core
        .withdraw(
            Arc::clone(&r.exchange) as Arc<dyn Exchange>,
            eth(),
            U256::from(10u64).pow(U256::from(18)),
            1_000,
        )
        .await
        .unwrap();

    // Tick 1: venue reports done plus the tx hash; the hash lands in the
    // journal and the activity stays blockchain-pending.
    r.fetcher.auth_tick().await.unwrap();
    let pending = r.journal.scan_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].exchange_status, ExchangeStatus::Done);
    assert_eq!(pending[0].result_str("tx"), Some(venue_tx.to_string().as_str()));

    // Tick 2: the receipt shows up; the activity goes terminal.
    r.chain.set_receipt(venue_tx, TxStatus::Mined);
    r.fetcher.auth_tick().await.unwrap();
    assert!(r.journal.scan_pending().await.unwrap().is_empty());
    let all = r.journal.scan_all().await.unwrap();
    let record = all.iter().find(|a| a.id == id).unwrap();
    assert_eq!(record.mining_status, MiningStatus::Mined);
}

#[tokio::test]
async fn trade_resolves_on_exchange_leg_alone() {
    let exchange = ScriptedExchange::new("binance");
    exchange.script_order(&[ExchangeStatus::Done]);
    let r = rig(exchange).await;

    // A partially filled trade left submitted by the core.
    let mut record_params = serde_json::Map::new();
    record_params.insert("type".to_string(), serde_json::Value::from("buy"));
    r.journal
        .record(common::ActivityRecord {
            action: common::ActivityAction::Trade,
            id: ActivityId::new(77, "order-77"),
            destination: "binance".to_string(),
            params: record_params,
            result: serde_json::Map::new(),
            exchange_status: ExchangeStatus::Submitted,
            mining_status: MiningStatus::Unset,
            timestamp: 77,
        })
        .await
        .unwrap();

    r.fetcher.auth_tick().await.unwrap();

    assert!(r.journal.scan_pending().await.unwrap().is_empty());
    let all = r.journal.scan_all().await.unwrap();
    assert_eq!(all[0].exchange_status, ExchangeStatus::Done);
}

#[tokio::test]
async fn auth_snapshot_carries_balances_and_refreshed_pending_set() {
    let exchange = ScriptedExchange::new("binance");
    exchange.script_deposit(&[ExchangeStatus::Done]);
    let r = rig(exchange).await;

    r.core
        .deposit(
            Arc::clone(&r.exchange) as Arc<dyn Exchange>,
            eth(),
            U256::from(1u64),
            1_000,
        )
        .await
        .unwrap();
    r.chain.set_receipt(B256::repeat_byte(0x11), TxStatus::Mined);

    r.fetcher.auth_tick().await.unwrap();

    let snapshot = r.fetcher.store().auth.latest().unwrap();
    assert_eq!(snapshot.version, 1);
    let balances = &snapshot.data.exchange_balances[&ExchangeId::new("binance")];
    assert!(balances.valid);
    assert_eq!(balances.available["ETH"], 50.0);
    // The deposit resolved inside the same tick; the published pending set
    // already reflects that.
    assert!(snapshot.data.pending_activities.is_empty());
}

#[tokio::test]
async fn snapshot_versions_strictly_increase() {
    let r = rig(ScriptedExchange::new("binance")).await;

    for expected in 1..=4u64 {
        r.fetcher.price_tick().await.unwrap();
        r.fetcher.rate_tick().await.unwrap();
        let price = r.fetcher.store().price.latest().unwrap();
        let rate = r.fetcher.store().rate.latest().unwrap();
        assert_eq!(price.version, expected);
        assert_eq!(rate.version, expected);
    }
}

#[tokio::test]
async fn price_snapshot_merges_per_exchange_books() {
    let r = rig(ScriptedExchange::new("binance")).await;
    r.fetcher.block_tick().await.unwrap();
    assert_eq!(r.fetcher.current_block(), 7);
    r.fetcher.price_tick().await.unwrap();

    let snapshot = r.fetcher.store().price.latest().unwrap();
    assert_eq!(snapshot.data.block, 7);
    let pair = common::TokenPairId::new("KNC", "ETH");
    let book = &snapshot.data.data[&pair][&ExchangeId::new("binance")];
    assert!(book.valid);
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.asks[0].rate, 0.011);
}

#[tokio::test]
async fn restore_seeds_store_from_journal() {
    let r = rig(ScriptedExchange::new("binance")).await;
    r.fetcher.price_tick().await.unwrap();
    r.fetcher.price_tick().await.unwrap();

    // A fresh fetcher over the same journal picks up the persisted snapshot
    // and continues the version sequence above it.
    let fetcher2 = Arc::new(Fetcher::new(
        Arc::clone(&r.journal) as Arc<dyn ActivityJournal>,
        Arc::clone(&r.chain) as Arc<dyn Blockchain>,
        vec![Arc::clone(&r.exchange) as Arc<dyn Exchange>],
        FetcherConfig::default(),
    ));
    fetcher2.restore().await.unwrap();
    assert_eq!(fetcher2.store().price.latest().unwrap().version, 2);
    fetcher2.price_tick().await.unwrap();
    assert_eq!(fetcher2.store().price.latest().unwrap().version, 3);
}

#[tokio::test]
async fn slow_exchange_skips_overlapping_ticks() {
    let mut exchange = ScriptedExchange::new("binance");
    // Each order-book fetch takes ~4 price periods.
    exchange.order_book_delay = Duration::from_millis(120);
    let r = rig(exchange).await;

    let fetcher = Arc::new(Fetcher::new(
        Arc::clone(&r.journal) as Arc<dyn ActivityJournal>,
        Arc::clone(&r.chain) as Arc<dyn Blockchain>,
        vec![Arc::clone(&r.exchange) as Arc<dyn Exchange>],
        FetcherConfig {
            price_period: Duration::from_millis(30),
            // Park the other tickers out of the test window.
            auth_period: Duration::from_secs(3_600),
            rate_period: Duration::from_secs(3_600),
            block_period: Duration::from_secs(3_600),
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = Arc::clone(&fetcher).start(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let published = fetcher
        .store()
        .price
        .latest()
        .map(|s| s.version)
        .unwrap_or(0);
    // Without skip-on-overrun ~16 ticks would fit in the window; with one
    // execution in flight at a time only ~4 can.
    assert!(published >= 1, "no price snapshot was published");
    assert!(
        published <= 8,
        "expected skipped ticks, got {published} publications"
    );
}
