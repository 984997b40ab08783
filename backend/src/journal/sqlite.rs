//! SQLite-backed journal.
//!
//! One `activities` table carries the full record; the `pending` column is
//! the secondary index, recomputed inside the same transaction as every
//! status write. The `token` column is denormalized from the params bag so
//! the deposit guard stays a single indexed lookup.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use common::activity::status_pending;
use common::{ActivityAction, ActivityId, ActivityRecord, ExchangeStatus, MiningStatus};

use super::{ActivityJournal, SnapshotKind, StorageError};

pub struct SqliteJournal {
    pool: SqlitePool,
}

impl SqliteJournal {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await?;
        let journal = Self { pool };
        journal.migrate().await?;
        Ok(journal)
    }

    /// Single-connection in-memory journal; used by tests and simulation
    /// runs. One connection, because every new `:memory:` connection is a
    /// fresh database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let journal = Self { pool };
        journal.migrate().await?;
        Ok(journal)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                id TEXT PRIMARY KEY,
                timepoint INTEGER NOT NULL,
                eid TEXT NOT NULL,
                action TEXT NOT NULL,
                destination TEXT NOT NULL,
                params TEXT NOT NULL,
                result TEXT NOT NULL,
                exchange_status TEXT NOT NULL,
                mining_status TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                pending INTEGER NOT NULL,
                token TEXT NOT NULL DEFAULT ''
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activities_order
             ON activities (timepoint DESC, eid DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_activities_pending
             ON activities (pending, action, token, destination)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                kind TEXT PRIMARY KEY,
                blob TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Token id carried in the params bag, for the deposit/withdraw index.
fn token_id_of(record: &ActivityRecord) -> &str {
    record
        .params
        .get("token")
        .and_then(|t| t.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ActivityRecord, StorageError> {
    let action_str: String = row.get("action");
    let action = ActivityAction::from_str(&action_str)
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    let exchange_status_str: String = row.get("exchange_status");
    let exchange_status = ExchangeStatus::from_str(&exchange_status_str)
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    let mining_status_str: String = row.get("mining_status");
    let mining_status = MiningStatus::from_str(&mining_status_str)
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;

    let params_json: String = row.get("params");
    let result_json: String = row.get("result");

    Ok(ActivityRecord {
        action,
        id: ActivityId::new(row.get::<i64, _>("timepoint") as u64, row.get::<String, _>("eid")),
        destination: row.get("destination"),
        params: serde_json::from_str(&params_json)?,
        result: serde_json::from_str(&result_json)?,
        exchange_status,
        mining_status,
        timestamp: row.get::<i64, _>("timestamp") as u64,
    })
}

#[async_trait]
impl ActivityJournal for SqliteJournal {
    async fn record(&self, record: ActivityRecord) -> Result<(), StorageError> {
        let pending = record.is_pending();
        let token = token_id_of(&record).to_string();
        let params = serde_json::to_string(&record.params)?;
        let result = serde_json::to_string(&record.result)?;

        sqlx::query(
            r#"
            INSERT INTO activities (
                id, timepoint, eid, action, destination,
                params, result, exchange_status, mining_status,
                timestamp, pending, token
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.id.timepoint as i64)
        .bind(&record.id.eid)
        .bind(record.action.as_str())
        .bind(&record.destination)
        .bind(params)
        .bind(result)
        .bind(record.exchange_status.as_str())
        .bind(record.mining_status.as_str())
        .bind(record.timestamp as i64)
        .bind(pending as i64)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: &ActivityId,
        exchange_status: ExchangeStatus,
        mining_status: MiningStatus,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT action FROM activities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        let action_str: String = row.get("action");
        let action = ActivityAction::from_str(&action_str)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let pending = status_pending(action, exchange_status, mining_status);

        sqlx::query(
            "UPDATE activities
             SET exchange_status = ?, mining_status = ?, pending = ?
             WHERE id = ?",
        )
        .bind(exchange_status.as_str())
        .bind(mining_status.as_str())
        .bind(pending as i64)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fill_withdraw_tx(&self, id: &ActivityId, tx_hash: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT result FROM activities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        let result_json: String = row.get("result");
        let mut result: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&result_json)?;
        result.insert("tx".to_string(), serde_json::Value::from(tx_hash));

        sqlx::query("UPDATE activities SET result = ? WHERE id = ?")
            .bind(serde_json::to_string(&result)?)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<ActivityRecord>, StorageError> {
        let rows = sqlx::query("SELECT * FROM activities ORDER BY timepoint DESC, eid DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn scan_pending(&self) -> Result<Vec<ActivityRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM activities WHERE pending = 1 ORDER BY timepoint DESC, eid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn has_pending_deposit(
        &self,
        token_id: &str,
        exchange_id: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM activities
             WHERE pending = 1 AND action = 'deposit' AND token = ? AND destination = ?",
        )
        .bind(token_id)
        .bind(exchange_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    async fn put_snapshot(&self, kind: SnapshotKind, blob: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO snapshots (kind, blob) VALUES (?, ?)
             ON CONFLICT(kind) DO UPDATE SET blob = excluded.blob",
        )
        .bind(kind.as_str())
        .bind(blob)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_snapshot(&self, kind: SnapshotKind) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT blob FROM snapshots WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("blob")))
    }
}
