//! Activity records and their lifecycle predicates.
//!
//! Every command the core executes is journaled as an [`ActivityRecord`].
//! A record tracks two independent legs: the exchange side (order accepted,
//! filled, failed) and the mining side (tx submitted, mined, reverted). The
//! pending predicates below are the single source of truth for when an
//! activity leaves the journal's pending index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::Timestamp;

/// Composite activity identifier: the issue-time timepoint plus an
/// action-specific external id. Total order is `(timepoint, eid)`.
///
/// Wire format is `"<timepoint>|<eid>"`; the external id may itself contain
/// `|`, so the first separator is the only one that counts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityId {
    pub timepoint: u64,
    pub eid: String,
}

impl ActivityId {
    pub fn new(timepoint: u64, eid: impl Into<String>) -> Self {
        Self {
            timepoint,
            eid: eid.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ActivityIdError {
    #[error("invalid activity id: missing '|' separator")]
    MissingSeparator,
    #[error("invalid activity id timepoint: {0}")]
    BadTimepoint(#[from] std::num::ParseIntError),
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.timepoint, self.eid)
    }
}

impl FromStr for ActivityId {
    type Err = ActivityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (timepoint, eid) = s.split_once('|').ok_or(ActivityIdError::MissingSeparator)?;
        Ok(Self {
            timepoint: timepoint.parse()?,
            eid: eid.to_string(),
        })
    }
}

impl Serialize for ActivityId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActivityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Trade,
    Deposit,
    Withdraw,
    SetRates,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Trade => "trade",
            ActivityAction::Deposit => "deposit",
            ActivityAction::Withdraw => "withdraw",
            ActivityAction::SetRates => "set_rates",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown activity action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActivityAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trade" => Ok(ActivityAction::Trade),
            "deposit" => Ok(ActivityAction::Deposit),
            "withdraw" => Ok(ActivityAction::Withdraw),
            "set_rates" => Ok(ActivityAction::SetRates),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange-side status. `Unset` is the empty string on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    #[default]
    #[serde(rename = "")]
    Unset,
    Submitted,
    Pending,
    Done,
    Failed,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Unset => "",
            ExchangeStatus::Submitted => "submitted",
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Done => "done",
            ExchangeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown exchange status: {0}")]
pub struct UnknownExchangeStatus(pub String);

impl FromStr for ExchangeStatus {
    type Err = UnknownExchangeStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(ExchangeStatus::Unset),
            "submitted" => Ok(ExchangeStatus::Submitted),
            "pending" => Ok(ExchangeStatus::Pending),
            "done" => Ok(ExchangeStatus::Done),
            "failed" => Ok(ExchangeStatus::Failed),
            other => Err(UnknownExchangeStatus(other.to_string())),
        }
    }
}

/// Mining-side status. `Unset` is the empty string on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningStatus {
    #[default]
    #[serde(rename = "")]
    Unset,
    Submitted,
    Mined,
    Failed,
}

impl MiningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiningStatus::Unset => "",
            MiningStatus::Submitted => "submitted",
            MiningStatus::Mined => "mined",
            MiningStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown mining status: {0}")]
pub struct UnknownMiningStatus(pub String);

impl FromStr for MiningStatus {
    type Err = UnknownMiningStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(MiningStatus::Unset),
            "submitted" => Ok(MiningStatus::Submitted),
            "mined" => Ok(MiningStatus::Mined),
            "failed" => Ok(MiningStatus::Failed),
            other => Err(UnknownMiningStatus(other.to_string())),
        }
    }
}

/// The durable unit of the journal. `params` and `result` stay schemaless
/// for forward compatibility with the strategy; action-specific readers pull
/// the keys they know about.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: ActivityAction,
    pub id: ActivityId,
    pub destination: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub result: serde_json::Map<String, serde_json::Value>,
    pub exchange_status: ExchangeStatus,
    pub mining_status: MiningStatus,
    pub timestamp: Timestamp,
}

/// Whether the exchange leg still needs polling. Trades and withdrawals sit
/// in `submitted` until the venue resolves them; deposits surface as
/// `pending` once the venue sees the incoming transfer.
pub fn exchange_pending(
    action: ActivityAction,
    exchange_status: ExchangeStatus,
    mining_status: MiningStatus,
) -> bool {
    match action {
        ActivityAction::Trade | ActivityAction::Withdraw => {
            matches!(
                exchange_status,
                ExchangeStatus::Unset | ExchangeStatus::Submitted
            ) && mining_status != MiningStatus::Failed
        }
        ActivityAction::Deposit => {
            matches!(
                exchange_status,
                ExchangeStatus::Unset | ExchangeStatus::Pending
            ) && mining_status != MiningStatus::Failed
        }
        ActivityAction::SetRates => false,
    }
}

/// Whether the mining leg still needs a receipt. Trades have no blockchain
/// leg.
pub fn blockchain_pending(
    action: ActivityAction,
    exchange_status: ExchangeStatus,
    mining_status: MiningStatus,
) -> bool {
    match action {
        ActivityAction::Withdraw | ActivityAction::Deposit | ActivityAction::SetRates => {
            matches!(
                mining_status,
                MiningStatus::Unset | MiningStatus::Submitted
            ) && exchange_status != ExchangeStatus::Failed
        }
        ActivityAction::Trade => false,
    }
}

/// An activity is terminal once both legs have resolved; only terminal
/// records leave the pending index.
pub fn status_pending(
    action: ActivityAction,
    exchange_status: ExchangeStatus,
    mining_status: MiningStatus,
) -> bool {
    exchange_pending(action, exchange_status, mining_status)
        || blockchain_pending(action, exchange_status, mining_status)
}

impl ActivityRecord {
    pub fn is_exchange_pending(&self) -> bool {
        exchange_pending(self.action, self.exchange_status, self.mining_status)
    }

    pub fn is_blockchain_pending(&self) -> bool {
        blockchain_pending(self.action, self.exchange_status, self.mining_status)
    }

    pub fn is_pending(&self) -> bool {
        status_pending(self.action, self.exchange_status, self.mining_status)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn result_str(&self, key: &str) -> Option<&str> {
        self.result.get(key).and_then(|v| v.as_str())
    }
}
