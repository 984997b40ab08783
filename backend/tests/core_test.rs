//! Reserve-core command tests against an in-memory journal and hand-rolled
//! adapter mocks that record every outbound call.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use adapters::{
    AdapterError, Blockchain, Exchange, OrderBook, TradeResult, TxStatus, WithdrawStatus,
};
use backend::core::ReserveCore;
use backend::error::CoreError;
use backend::journal::{ActivityJournal, SqliteJournal};
use common::exchange_info::ExchangeInfo;
use common::fees::ExchangeFees;
use common::{
    ActivityAction, ActivityId, BalanceEntry, EBalanceEntry, ExchangeId, ExchangeStatus,
    MiningStatus, RateEntry, Token, TokenPair, TradeSide,
};

fn eth() -> Token {
    Token::new("ETH", Address::repeat_byte(0xEE), 18)
}

fn knc() -> Token {
    Token::new("KNC", Address::repeat_byte(0x01), 18)
}

struct MockExchange {
    id: ExchangeId,
    supported: Vec<String>,
    trade_reply: Result<TradeResult, String>,
    withdraw_reply: Result<String, String>,
    cancelled: Mutex<Vec<ActivityId>>,
}

impl MockExchange {
    fn new(supported: &[&str]) -> Self {
        Self {
            id: ExchangeId::new("binance"),
            supported: supported.iter().map(|s| s.to_string()).collect(),
            trade_reply: Ok(TradeResult {
                id: "order-1".to_string(),
                done: 1.0,
                remaining: 0.0,
                finished: true,
            }),
            withdraw_reply: Ok("withdraw-1".to_string()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn deposit_address(&self, token: &Token) -> Option<Address> {
        self.supported
            .iter()
            .any(|t| *t == token.id)
            .then(|| Address::repeat_byte(0x44))
    }

    fn pairs(&self) -> Vec<TokenPair> {
        Vec::new()
    }

    async fn fetch_order_book(&self, _pair: &TokenPair) -> Result<OrderBook, AdapterError> {
        Ok(OrderBook::default())
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
        self.trade_reply
            .clone()
            .map_err(AdapterError::Remote)
    }

    async fn withdraw(
        &self,
        _token: &Token,
        _amount: U256,
        _destination: Address,
        _timepoint: u64,
    ) -> Result<String, AdapterError> {
        self.withdraw_reply.clone().map_err(AdapterError::Remote)
    }

    async fn cancel_order(&self, id: &ActivityId) -> Result<(), AdapterError> {
        self.cancelled.lock().push(id.clone());
        Ok(())
    }

    async fn order_status(
        &self,
        _id: &ActivityId,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(ExchangeStatus::Submitted)
    }

    async fn deposit_status(
        &self,
        _id: &ActivityId,
        _tx: B256,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(ExchangeStatus::Unset)
    }

    async fn withdraw_status(
        &self,
        _id: &ActivityId,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<WithdrawStatus, AdapterError> {
        Ok(WithdrawStatus {
            status: ExchangeStatus::Submitted,
            tx: None,
        })
    }

    async fn fetch_balances(&self) -> Result<EBalanceEntry, AdapterError> {
        Ok(EBalanceEntry::default())
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

#[derive(Default)]
struct MockChain {
    sends: Mutex<Vec<(String, U256, Address)>>,
    set_rates_calls: Mutex<Vec<(Vec<Address>, Vec<U256>, Vec<U256>, u64)>>,
    fail_send: bool,
}

#[async_trait]
impl Blockchain for MockChain {
    async fn send(
        &self,
        token: &Token,
        amount: U256,
        destination: Address,
    ) -> Result<B256, AdapterError> {
        if self.fail_send {
            return Err(AdapterError::Remote("insufficient funds".to_string()));
        }
        let mut sends = self.sends.lock();
        sends.push((token.id.clone(), amount, destination));
        Ok(B256::from(U256::from(sends.len() as u64)))
    }

    async fn set_rates(
        &self,
        tokens: Vec<Address>,
        buys: Vec<U256>,
        sells: Vec<U256>,
        block: u64,
    ) -> Result<B256, AdapterError> {
        self.set_rates_calls
            .lock()
            .push((tokens, buys, sells, block));
        Ok(B256::repeat_byte(0x77))
    }

    async fn tx_status(&self, _tx: B256) -> Result<TxStatus, AdapterError> {
        Ok(TxStatus::Pending)
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        Ok(1)
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, AdapterError> {
        Ok(HashMap::new())
    }

    async fn fetch_reserve_balances(&self) -> Result<HashMap<String, BalanceEntry>, AdapterError> {
        Ok(HashMap::new())
    }
}

struct Harness {
    core: ReserveCore,
    journal: Arc<SqliteJournal>,
    chain: Arc<MockChain>,
}

async fn harness(chain: MockChain) -> Harness {
    let journal = Arc::new(SqliteJournal::in_memory().await.unwrap());
    let chain = Arc::new(chain);
    let core = ReserveCore::new(
        Arc::clone(&chain) as Arc<dyn Blockchain>,
        Arc::clone(&journal) as Arc<dyn ActivityJournal>,
        Address::repeat_byte(0x99),
    );
    Harness {
        core,
        journal,
        chain,
    }
}

#[tokio::test]
async fn deposit_records_and_submits() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH", "KNC"]));

    let id = h
        .core
        .deposit(exchange, eth(), U256::from(1u64), 1_000)
        .await
        .unwrap();

    // External id carries tx, token and float amount.
    assert!(id.eid.contains("|ETH|"));
    assert_eq!(h.chain.sends.lock().len(), 1);

    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].action, ActivityAction::Deposit);
    assert_eq!(all[0].mining_status, MiningStatus::Submitted);
    assert_eq!(all[0].exchange_status, ExchangeStatus::Unset);
    assert!(all[0].is_pending());
}

#[tokio::test]
async fn second_deposit_for_same_key_is_rejected_without_a_send() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH"]));

    h.core
        .deposit(Arc::clone(&exchange) as Arc<dyn Exchange>, eth(), U256::from(1u64), 1_000)
        .await
        .unwrap();

    let err = h
        .core
        .deposit(exchange, eth(), U256::from(1u64), 1_001)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::PendingConflict { .. }));
    let message = err.to_string().to_lowercase();
    assert!(message.contains("pending"), "got: {message}");
    assert!(message.contains("deposit"), "got: {message}");

    // No second transaction went out; the rejection is journaled as failed.
    assert_eq!(h.chain.sends.lock().len(), 1);
    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all.len(), 2);
    let failed = all.iter().find(|r| !r.is_pending()).unwrap();
    assert_eq!(failed.mining_status, MiningStatus::Failed);
}

#[tokio::test]
async fn deposit_to_different_exchange_or_token_is_allowed() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH", "KNC"]));

    h.core
        .deposit(Arc::clone(&exchange) as Arc<dyn Exchange>, eth(), U256::from(1u64), 1_000)
        .await
        .unwrap();
    // Same venue, different token: no conflict.
    h.core
        .deposit(exchange, knc(), U256::from(1u64), 1_001)
        .await
        .unwrap();

    assert_eq!(h.chain.sends.lock().len(), 2);
}

#[tokio::test]
async fn deposit_of_unsupported_token_is_validation_error() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["KNC"]));

    let err = h
        .core
        .deposit(exchange, eth(), U256::from(1u64), 1_000)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));
    assert!(h.chain.sends.lock().is_empty());
    // Still journaled, as failed.
    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].mining_status, MiningStatus::Failed);
}

#[tokio::test]
async fn failed_send_is_recorded_with_error_message() {
    let h = harness(MockChain {
        fail_send: true,
        ..Default::default()
    })
    .await;
    let exchange = Arc::new(MockExchange::new(&["ETH"]));

    let err = h
        .core
        .deposit(exchange, eth(), U256::from(1u64), 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Adapter(_)));

    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].mining_status, MiningStatus::Failed);
    assert_eq!(
        all[0].result_str("error"),
        Some("insufficient funds")
    );
    assert!(!all[0].is_pending());
}

#[tokio::test]
async fn finished_trade_records_done() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH", "KNC"]));

    let outcome = h
        .core
        .trade(exchange, TradeSide::Buy, knc(), eth(), 0.01, 100.0, 1_000)
        .await
        .unwrap();

    assert!(outcome.finished);
    assert_eq!(outcome.id.eid, "order-1");

    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].exchange_status, ExchangeStatus::Done);
    assert_eq!(all[0].param_str("type"), Some("buy"));
    assert!(!all[0].is_pending());
}

#[tokio::test]
async fn unfinished_trade_stays_pending_as_submitted() {
    let h = harness(MockChain::default()).await;
    let mut exchange = MockExchange::new(&["ETH", "KNC"]);
    exchange.trade_reply = Ok(TradeResult {
        id: "order-2".to_string(),
        done: 40.0,
        remaining: 60.0,
        finished: false,
    });

    let outcome = h
        .core
        .trade(
            Arc::new(exchange),
            TradeSide::Sell,
            knc(),
            eth(),
            0.01,
            100.0,
            1_000,
        )
        .await
        .unwrap();

    assert!(!outcome.finished);
    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].exchange_status, ExchangeStatus::Submitted);
    assert!(all[0].is_pending());
}

#[tokio::test]
async fn withdraw_records_empty_tx_for_the_fetcher_to_fill() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH"]));

    let id = h
        .core
        .withdraw(exchange, eth(), U256::from(5u64), 1_000)
        .await
        .unwrap();
    assert_eq!(id.eid, "withdraw-1");

    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].exchange_status, ExchangeStatus::Submitted);
    assert_eq!(all[0].result_str("tx"), Some(""));
    assert!(all[0].is_blockchain_pending());
}

#[tokio::test]
async fn set_rates_length_mismatch_submits_nothing() {
    let h = harness(MockChain::default()).await;

    let err = h
        .core
        .set_rates(
            vec![knc(), eth()],
            vec![U256::from(1u64)],
            vec![U256::from(1u64), U256::from(2u64)],
            1,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));
    assert!(err.to_string().contains("same length"));
    assert!(h.chain.set_rates_calls.lock().is_empty());

    let all = h.journal.scan_all().await.unwrap();
    assert_eq!(all[0].mining_status, MiningStatus::Failed);
}

#[tokio::test]
async fn set_rates_records_aligned_params() {
    let h = harness(MockChain::default()).await;

    let id = h
        .core
        .set_rates(
            vec![knc()],
            vec![U256::from(10_000u64)],
            vec![U256::from(9_000u64)],
            100,
        )
        .await
        .unwrap();
    assert_eq!(id.eid, B256::repeat_byte(0x77).to_string());

    let all = h.journal.scan_all().await.unwrap();
    let record = &all[0];
    assert_eq!(record.destination, "blockchain");
    assert_eq!(record.mining_status, MiningStatus::Submitted);

    // Token, buy and sell lists stay index-aligned in the params bag.
    let tokens = record.params["tokens"].as_array().unwrap();
    let buys = record.params["buys"].as_array().unwrap();
    let sells = record.params["sells"].as_array().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(buys.len(), tokens.len());
    assert_eq!(sells.len(), tokens.len());
    assert_eq!(buys[0], "10000");
}

#[tokio::test]
async fn cancel_order_delegates_to_the_venue() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH"]));
    let id = ActivityId::new(5, "order-9");

    h.core
        .cancel_order(&id, Arc::clone(&exchange) as Arc<dyn Exchange>)
        .await
        .unwrap();

    assert_eq!(exchange.cancelled.lock().as_slice(), &[id]);
}

#[tokio::test]
async fn activity_ids_strictly_increase_across_commands() {
    let h = harness(MockChain::default()).await;
    let exchange = Arc::new(MockExchange::new(&["ETH", "KNC"]));

    let mut ids = Vec::new();
    for i in 0..5u64 {
        let token = if i % 2 == 0 { eth() } else { knc() };
        let exchange = Arc::clone(&exchange) as Arc<dyn Exchange>;
        let outcome = h
            .core
            .trade(exchange, TradeSide::Buy, token, eth(), 0.01, 1.0, 1_000 + i)
            .await
            .unwrap();
        ids.push(outcome.id);
    }

    for pair in ids.windows(2) {
        assert!(pair[0].timepoint < pair[1].timepoint);
    }
}
