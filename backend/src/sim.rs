//! In-process simulated adapters.
//!
//! Stand-ins for the concrete venue and chain clients, used by the binary's
//! simulation mode and by the HTTP-level tests. Behavior is deliberately
//! optimistic: orders fill, transfers settle, transactions mine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::RwLock;

use adapters::{
    AdapterError, Blockchain, Exchange, OrderBook, TradeResult, TxStatus, WithdrawStatus,
};
use common::exchange_info::{
    AmountLimit, ExchangeInfo, PairPrecision, PairPrecisionLimit, PriceLimit,
};
use common::fees::{ExchangeFees, FundingFee};
use common::{
    now_ms, ActivityId, BalanceEntry, EBalanceEntry, ExchangeId, ExchangeStatus, PriceEntry,
    RateEntry, Token, TokenPair, TradeSide,
};

pub struct SimExchange {
    id: ExchangeId,
    deposit_address: Address,
    tokens: Vec<Token>,
    info: Arc<ExchangeInfo>,
    order_seq: AtomicU64,
}

impl SimExchange {
    /// Pairs every non-ETH token against ETH, the way the reserve trades.
    pub fn new(id: &str, deposit_address: Address, tokens: Vec<Token>) -> Self {
        let sim = Self {
            id: ExchangeId::new(id),
            deposit_address,
            tokens,
            info: Arc::new(ExchangeInfo::new()),
            order_seq: AtomicU64::new(0),
        };
        sim.seed_precision();
        sim
    }

    fn eth(&self) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == "ETH")
    }

    fn seed_precision(&self) {
        for pair in self.pairs() {
            self.info.update(
                pair.pair_id(),
                PairPrecisionLimit {
                    precision: PairPrecision {
                        amount: 4,
                        price: 6,
                    },
                    amount_limit: AmountLimit {
                        min: 0.01,
                        max: 1_000_000.0,
                    },
                    price_limit: PriceLimit {
                        min: 1e-6,
                        max: 1e6,
                    },
                },
            );
        }
    }
}

#[async_trait]
impl Exchange for SimExchange {
    fn id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn deposit_address(&self, token: &Token) -> Option<Address> {
        self.tokens
            .iter()
            .any(|t| t.id == token.id)
            .then_some(self.deposit_address)
    }

    fn pairs(&self) -> Vec<TokenPair> {
        let Some(eth) = self.eth() else {
            return Vec::new();
        };
        self.tokens
            .iter()
            .filter(|t| t.id != "ETH")
            .map(|t| TokenPair {
                base: t.clone(),
                quote: eth.clone(),
            })
            .collect()
    }

    async fn fetch_order_book(&self, _pair: &TokenPair) -> Result<OrderBook, AdapterError> {
        Ok(OrderBook {
            bids: vec![PriceEntry {
                quantity: 100.0,
                rate: 0.0099,
            }],
            asks: vec![PriceEntry {
                quantity: 100.0,
                rate: 0.0101,
            }],
        })
    }

    async fn trade(
        &self,
        _side: TradeSide,
        _base: &Token,
        _quote: &Token,
        _rate: f64,
        amount: f64,
        _timepoint: u64,
    ) -> Result<TradeResult, AdapterError> {
        let seq = self.order_seq.fetch_add(1, Ordering::Relaxed);
        Ok(TradeResult {
            id: format!("sim-order-{seq}"),
            done: amount,
            remaining: 0.0,
            finished: true,
        })
    }

    async fn withdraw(
        &self,
        _token: &Token,
        _amount: U256,
        _destination: Address,
        timepoint: u64,
    ) -> Result<String, AdapterError> {
        Ok(format!("sim-withdraw-{timepoint}"))
    }

    async fn cancel_order(&self, _id: &ActivityId) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn order_status(
        &self,
        _id: &ActivityId,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(ExchangeStatus::Done)
    }

    async fn deposit_status(
        &self,
        _id: &ActivityId,
        _tx: B256,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<ExchangeStatus, AdapterError> {
        Ok(ExchangeStatus::Done)
    }

    async fn withdraw_status(
        &self,
        _id: &ActivityId,
        _amount: f64,
        _timepoint: u64,
    ) -> Result<WithdrawStatus, AdapterError> {
        Ok(WithdrawStatus {
            status: ExchangeStatus::Done,
            tx: Some(B256::repeat_byte(0xAB)),
        })
    }

    async fn fetch_balances(&self) -> Result<EBalanceEntry, AdapterError> {
        let available = self.tokens.iter().map(|t| (t.id.clone(), 100.0)).collect();
        Ok(EBalanceEntry {
            available,
            ..Default::default()
        })
    }

    fn info(&self) -> Arc<ExchangeInfo> {
        Arc::clone(&self.info)
    }

    async fn refresh_precision(&self) -> Result<(), AdapterError> {
        self.seed_precision();
        Ok(())
    }

    fn fees(&self) -> ExchangeFees {
        let trading = HashMap::from([("taker".to_string(), 0.001), ("maker".to_string(), 0.001)]);
        let funding = FundingFee {
            withdraw: self.tokens.iter().map(|t| (t.id.clone(), 0.01)).collect(),
            deposit: self.tokens.iter().map(|t| (t.id.clone(), 0.0)).collect(),
        };
        ExchangeFees::new(trading, funding)
    }
}

pub struct SimBlockchain {
    tokens: Vec<Token>,
    tx_seq: AtomicU64,
    block: AtomicU64,
    rates: RwLock<HashMap<String, RateEntry>>,
}

impl SimBlockchain {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            tx_seq: AtomicU64::new(1),
            block: AtomicU64::new(1),
            rates: RwLock::new(HashMap::new()),
        }
    }

    fn next_tx(&self) -> B256 {
        B256::from(U256::from(self.tx_seq.fetch_add(1, Ordering::Relaxed)))
    }
}

#[async_trait]
impl Blockchain for SimBlockchain {
    async fn send(
        &self,
        _token: &Token,
        _amount: U256,
        _destination: Address,
    ) -> Result<B256, AdapterError> {
        Ok(self.next_tx())
    }

    async fn set_rates(
        &self,
        tokens: Vec<Address>,
        buys: Vec<U256>,
        sells: Vec<U256>,
        block: u64,
    ) -> Result<B256, AdapterError> {
        let mut rates = self.rates.write();
        for (i, address) in tokens.iter().enumerate() {
            let Some(token) = self.tokens.iter().find(|t| t.address == *address) else {
                continue;
            };
            rates.insert(
                token.id.clone(),
                RateEntry {
                    base_buy: buys[i],
                    compact_buy: 0,
                    base_sell: sells[i],
                    compact_sell: 0,
                    block,
                },
            );
        }
        Ok(self.next_tx())
    }

    async fn tx_status(&self, _tx: B256) -> Result<TxStatus, AdapterError> {
        Ok(TxStatus::Mined)
    }

    async fn current_block(&self) -> Result<u64, AdapterError> {
        Ok(self.block.fetch_add(1, Ordering::Relaxed))
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, RateEntry>, AdapterError> {
        Ok(self.rates.read().clone())
    }

    async fn fetch_reserve_balances(&self) -> Result<HashMap<String, BalanceEntry>, AdapterError> {
        let now = now_ms();
        Ok(self
            .tokens
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    BalanceEntry {
                        valid: true,
                        error: String::new(),
                        timestamp: now,
                        return_time: now,
                        balance: U256::from(1_000u64)
                            * U256::from(10u64).pow(U256::from(t.decimals)),
                    },
                )
            })
            .collect())
    }
}
