//! Durable, ordered storage of activity records plus last-writer-wins blobs
//! for the published snapshots.
//!
//! The journal is the source of truth for the pending set: `record` and
//! `update_status` maintain a secondary index so `scan_pending` and the
//! per-`(token, exchange)` deposit guard stay cheap. Records are never
//! deleted; they leave the index once both lifecycle legs are terminal.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use common::{ActivityId, ActivityRecord, ExchangeStatus, MiningStatus};

pub use sqlite::SqliteJournal;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("activity {0} not found")]
    NotFound(ActivityId),

    #[error("corrupt journal row: {0}")]
    Corrupt(String),
}

/// Snapshot kinds persisted alongside the journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Price,
    Rate,
    Auth,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Price => "price",
            SnapshotKind::Rate => "rate",
            SnapshotKind::Auth => "auth",
        }
    }
}

#[async_trait]
pub trait ActivityJournal: Send + Sync {
    /// Append one record. Atomic with respect to concurrent readers: a
    /// scan either sees the whole record or none of it, and a successful
    /// return guarantees visibility to subsequent scans.
    async fn record(&self, record: ActivityRecord) -> Result<(), StorageError>;

    /// Atomically replace the two status fields, recomputing the pending
    /// index entry in the same transaction. The fetcher's auth tick is the
    /// only caller.
    async fn update_status(
        &self,
        id: &ActivityId,
        exchange_status: ExchangeStatus,
        mining_status: MiningStatus,
    ) -> Result<(), StorageError>;

    /// Write the on-chain tx hash into a withdraw's result once the venue
    /// reports it, so the receipt poll can pick the activity up.
    async fn fill_withdraw_tx(&self, id: &ActivityId, tx: &str) -> Result<(), StorageError>;

    /// Every record, newest first (`(timepoint, eid)` descending).
    async fn scan_all(&self) -> Result<Vec<ActivityRecord>, StorageError>;

    /// Records whose pending predicate holds, newest first.
    async fn scan_pending(&self) -> Result<Vec<ActivityRecord>, StorageError>;

    /// O(1) guard for the at-most-one-pending-deposit invariant.
    async fn has_pending_deposit(
        &self,
        token_id: &str,
        exchange_id: &str,
    ) -> Result<bool, StorageError>;

    async fn put_snapshot(&self, kind: SnapshotKind, blob: &str) -> Result<(), StorageError>;

    async fn get_snapshot(&self, kind: SnapshotKind) -> Result<Option<String>, StorageError>;
}
