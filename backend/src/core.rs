//! The command side of the reserve.
//!
//! Every public operation follows the same shape: validate, call the
//! adapter, journal the outcome (success or failure) synchronously, return.
//! The core never retries; the fetcher's cadence is the retry loop, and the
//! journal entry is what lets it pick the activity up.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use serde_json::{Map, Value};
use tracing::info;

use adapters::{Blockchain, Exchange};
use common::{
    big_to_float, next_timepoint, ActivityAction, ActivityId, ActivityRecord, ExchangeStatus,
    MiningStatus, Token, TradeSide,
};

use crate::error::CoreError;
use crate::journal::ActivityJournal;

/// Destination recorded for on-chain-only activities.
pub const BLOCKCHAIN_DESTINATION: &str = "blockchain";

#[derive(Clone, Debug)]
pub struct TradeOutcome {
    pub id: ActivityId,
    pub done: f64,
    pub remaining: f64,
    pub finished: bool,
}

pub struct ReserveCore {
    blockchain: Arc<dyn Blockchain>,
    journal: Arc<dyn ActivityJournal>,
    reserve_address: Address,
}

fn error_value(message: &Option<String>) -> Value {
    match message {
        Some(m) => Value::from(m.as_str()),
        None => Value::Null,
    }
}

impl ReserveCore {
    pub fn new(
        blockchain: Arc<dyn Blockchain>,
        journal: Arc<dyn ActivityJournal>,
        reserve_address: Address,
    ) -> Self {
        Self {
            blockchain,
            journal,
            reserve_address,
        }
    }

    pub async fn trade(
        &self,
        exchange: Arc<dyn Exchange>,
        side: TradeSide,
        base: Token,
        quote: Token,
        rate: f64,
        amount: f64,
        timepoint: u64,
    ) -> Result<TradeOutcome, CoreError> {
        let outcome = exchange
            .trade(side, &base, &quote, rate, amount, timepoint)
            .await
            .map_err(CoreError::from);

        let (eid, done, remaining, finished) = match &outcome {
            Ok(r) => (r.id.clone(), r.done, r.remaining, r.finished),
            Err(_) => (String::new(), 0.0, 0.0, false),
        };
        let exchange_status = match &outcome {
            Ok(r) if r.finished => ExchangeStatus::Done,
            Ok(_) => ExchangeStatus::Submitted,
            Err(_) => ExchangeStatus::Failed,
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());

        let id = ActivityId::new(next_timepoint(), eid.clone());

        let mut params = Map::new();
        params.insert("exchange".into(), Value::from(exchange.id().as_str()));
        params.insert("type".into(), Value::from(side.as_str()));
        params.insert("base".into(), serde_json::to_value(&base)?);
        params.insert("quote".into(), serde_json::to_value(&quote)?);
        params.insert("rate".into(), Value::from(rate));
        params.insert("amount".into(), Value::from(amount.to_string()));
        params.insert("timepoint".into(), Value::from(timepoint));

        let mut result = Map::new();
        result.insert("id".into(), Value::from(eid));
        result.insert("done".into(), Value::from(done));
        result.insert("remaining".into(), Value::from(remaining));
        result.insert("finished".into(), Value::from(finished));
        result.insert("error".into(), error_value(&error));

        self.journal
            .record(ActivityRecord {
                action: ActivityAction::Trade,
                id: id.clone(),
                destination: exchange.id().as_str().to_string(),
                params,
                result,
                exchange_status,
                mining_status: MiningStatus::Unset,
                timestamp: timepoint,
            })
            .await?;

        info!(
            target: "core",
            exchange = %exchange.id(),
            %side,
            base = %base.id,
            quote = %quote.id,
            rate,
            amount,
            id = %id,
            done,
            remaining,
            finished,
            error = error.as_deref().unwrap_or(""),
            "trade"
        );

        outcome.map(|r| TradeOutcome {
            id,
            done: r.done,
            remaining: r.remaining,
            finished: r.finished,
        })
    }

    /// Moves reserve inventory onto an exchange. At most one deposit per
    /// `(token, exchange)` may be in flight; a conflicting request is
    /// journaled as failed and rejected before any transaction is sent.
    pub async fn deposit(
        &self,
        exchange: Arc<dyn Exchange>,
        token: Token,
        amount: U256,
        timepoint: u64,
    ) -> Result<ActivityId, CoreError> {
        let outcome: Result<B256, CoreError> = match exchange.deposit_address(&token) {
            None => Err(CoreError::Validation(format!(
                "Exchange {} doesn't support token {}",
                exchange.id(),
                token.id
            ))),
            Some(address) => {
                if self
                    .journal
                    .has_pending_deposit(&token.id, exchange.id().as_str())
                    .await?
                {
                    Err(CoreError::PendingConflict {
                        token: token.id.clone(),
                        exchange: exchange.id().as_str().to_string(),
                    })
                } else {
                    self.blockchain
                        .send(&token, amount, address)
                        .await
                        .map_err(CoreError::from)
                }
            }
        };

        let tx = *outcome.as_ref().unwrap_or(&B256::ZERO);
        let mining_status = match &outcome {
            Ok(_) => MiningStatus::Submitted,
            Err(_) => MiningStatus::Failed,
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());

        let amount_float = big_to_float(amount, token.decimals);
        let id = ActivityId::new(
            next_timepoint(),
            format!("{tx}|{}|{}", token.id, amount_float),
        );

        let mut params = Map::new();
        params.insert("exchange".into(), Value::from(exchange.id().as_str()));
        params.insert("token".into(), serde_json::to_value(&token)?);
        params.insert("amount".into(), Value::from(amount_float.to_string()));
        params.insert("timepoint".into(), Value::from(timepoint));

        let mut result = Map::new();
        result.insert("tx".into(), Value::from(tx.to_string()));
        result.insert("error".into(), error_value(&error));

        self.journal
            .record(ActivityRecord {
                action: ActivityAction::Deposit,
                id: id.clone(),
                destination: exchange.id().as_str().to_string(),
                params,
                result,
                exchange_status: ExchangeStatus::Unset,
                mining_status,
                timestamp: timepoint,
            })
            .await?;

        info!(
            target: "core",
            exchange = %exchange.id(),
            token = %token.id,
            amount = %amount,
            id = %id,
            tx = %tx,
            error = error.as_deref().unwrap_or(""),
            "deposit"
        );

        outcome.map(|_| id)
    }

    pub async fn withdraw(
        &self,
        exchange: Arc<dyn Exchange>,
        token: Token,
        amount: U256,
        timepoint: u64,
    ) -> Result<ActivityId, CoreError> {
        let outcome: Result<String, CoreError> = match exchange.deposit_address(&token) {
            None => Err(CoreError::Validation(format!(
                "Exchange {} doesn't support token {}",
                exchange.id(),
                token.id
            ))),
            Some(_) => exchange
                .withdraw(&token, amount, self.reserve_address, timepoint)
                .await
                .map_err(CoreError::from),
        };

        let eid = outcome.as_deref().unwrap_or("").to_string();
        let exchange_status = match &outcome {
            Ok(_) => ExchangeStatus::Submitted,
            Err(_) => ExchangeStatus::Failed,
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());

        let id = ActivityId::new(next_timepoint(), eid.clone());

        let mut params = Map::new();
        params.insert("exchange".into(), Value::from(exchange.id().as_str()));
        params.insert("token".into(), serde_json::to_value(&token)?);
        params.insert(
            "amount".into(),
            Value::from(big_to_float(amount, token.decimals).to_string()),
        );
        params.insert("timepoint".into(), Value::from(timepoint));

        let mut result = Map::new();
        result.insert("id".into(), Value::from(eid));
        result.insert("error".into(), error_value(&error));
        // Filled by the fetcher once the venue reports the on-chain tx.
        result.insert("tx".into(), Value::from(""));

        self.journal
            .record(ActivityRecord {
                action: ActivityAction::Withdraw,
                id: id.clone(),
                destination: exchange.id().as_str().to_string(),
                params,
                result,
                exchange_status,
                mining_status: MiningStatus::Unset,
                timestamp: timepoint,
            })
            .await?;

        info!(
            target: "core",
            exchange = %exchange.id(),
            token = %token.id,
            amount = %amount,
            id = %id,
            error = error.as_deref().unwrap_or(""),
            "withdraw"
        );

        outcome.map(|_| id)
    }

    pub async fn cancel_order(
        &self,
        id: &ActivityId,
        exchange: Arc<dyn Exchange>,
    ) -> Result<(), CoreError> {
        exchange.cancel_order(id).await.map_err(CoreError::from)
    }

    pub async fn set_rates(
        &self,
        tokens: Vec<Token>,
        buys: Vec<U256>,
        sells: Vec<U256>,
        block: u64,
    ) -> Result<ActivityId, CoreError> {
        let outcome: Result<B256, CoreError> =
            if tokens.len() != buys.len() || tokens.len() != sells.len() {
                Err(CoreError::Validation(
                    "Tokens, buys and sells must have the same length".to_string(),
                ))
            } else {
                let addresses = tokens.iter().map(|t| t.address).collect();
                self.blockchain
                    .set_rates(addresses, buys.clone(), sells.clone(), block)
                    .await
                    .map_err(CoreError::from)
            };

        let tx = *outcome.as_ref().unwrap_or(&B256::ZERO);
        let mining_status = match &outcome {
            Ok(_) => MiningStatus::Submitted,
            Err(_) => MiningStatus::Failed,
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());

        let id = ActivityId::new(next_timepoint(), tx.to_string());

        let mut params = Map::new();
        params.insert("tokens".into(), serde_json::to_value(&tokens)?);
        params.insert(
            "buys".into(),
            Value::from(buys.iter().map(U256::to_string).collect::<Vec<_>>()),
        );
        params.insert(
            "sells".into(),
            Value::from(sells.iter().map(U256::to_string).collect::<Vec<_>>()),
        );
        params.insert("block".into(), Value::from(block));

        let mut result = Map::new();
        result.insert("tx".into(), Value::from(tx.to_string()));
        result.insert("error".into(), error_value(&error));

        self.journal
            .record(ActivityRecord {
                action: ActivityAction::SetRates,
                id: id.clone(),
                destination: BLOCKCHAIN_DESTINATION.to_string(),
                params,
                result,
                exchange_status: ExchangeStatus::Unset,
                mining_status,
                timestamp: next_timepoint(),
            })
            .await?;

        info!(
            target: "core",
            tokens = tokens.len(),
            block,
            id = %id,
            tx = %tx,
            error = error.as_deref().unwrap_or(""),
            "set rates"
        );

        outcome.map(|_| id)
    }
}
