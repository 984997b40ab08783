//! Strategy-supplied metric store.
//!
//! The write path accepts one entry per timestamp with per-token
//! `(afp_mid, spread)` pairs; the read path returns descending-time series
//! per requested token. Not part of the fetcher/core pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use common::{Timestamp, Token};

use crate::journal::StorageError;

/// In-memory ring capacity.
const MAX_CAPACITY: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMetric {
    pub afp_mid: f64,
    pub spread: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricEntry {
    pub timestamp: Timestamp,
    pub data: HashMap<String, TokenMetric>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMetricPoint {
    pub timestamp: Timestamp,
    pub afp_mid: f64,
    pub spread: f64,
}

pub type MetricSeries = HashMap<String, Vec<TokenMetricPoint>>;

#[async_trait]
pub trait MetricStorage: Send + Sync {
    async fn store_metric(&self, entry: MetricEntry, timepoint: u64) -> Result<(), StorageError>;

    /// Series per token within `[from, to]`, newest first.
    async fn get_metric(
        &self,
        tokens: &[Token],
        from: u64,
        to: u64,
    ) -> Result<MetricSeries, StorageError>;
}

/// Volatile variant: a capped vector, oldest entries dropped at the cap.
#[derive(Default)]
pub struct RamMetricStorage {
    data: RwLock<Vec<MetricEntry>>,
}

impl RamMetricStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStorage for RamMetricStorage {
    async fn store_metric(&self, entry: MetricEntry, _timepoint: u64) -> Result<(), StorageError> {
        let mut data = self.data.write();
        data.push(entry);
        let overflow = data.len().saturating_sub(MAX_CAPACITY);
        if overflow > 0 {
            data.drain(..overflow);
        }
        Ok(())
    }

    async fn get_metric(
        &self,
        tokens: &[Token],
        from: u64,
        to: u64,
    ) -> Result<MetricSeries, StorageError> {
        let mut result: MetricSeries = tokens
            .iter()
            .map(|t| (t.id.clone(), Vec::new()))
            .collect();
        let data = self.data.read();
        for entry in data.iter().rev() {
            if entry.timestamp < from {
                break;
            }
            if entry.timestamp > to {
                continue;
            }
            for (token_id, metric) in &entry.data {
                if let Some(series) = result.get_mut(token_id) {
                    series.push(TokenMetricPoint {
                        timestamp: entry.timestamp,
                        afp_mid: metric.afp_mid,
                        spread: metric.spread,
                    });
                }
            }
        }
        Ok(result)
    }
}

/// Durable variant sharing the journal's pool.
pub struct SqliteMetricStorage {
    pool: SqlitePool,
}

impl SqliteMetricStorage {
    pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metrics (
                timestamp INTEGER NOT NULL,
                token TEXT NOT NULL,
                afp_mid REAL NOT NULL,
                spread REAL NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_token_time
             ON metrics (token, timestamp DESC)",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MetricStorage for SqliteMetricStorage {
    async fn store_metric(&self, entry: MetricEntry, _timepoint: u64) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for (token_id, metric) in &entry.data {
            sqlx::query(
                "INSERT INTO metrics (timestamp, token, afp_mid, spread) VALUES (?, ?, ?, ?)",
            )
            .bind(entry.timestamp as i64)
            .bind(token_id)
            .bind(metric.afp_mid)
            .bind(metric.spread)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_metric(
        &self,
        tokens: &[Token],
        from: u64,
        to: u64,
    ) -> Result<MetricSeries, StorageError> {
        let mut result: MetricSeries = tokens
            .iter()
            .map(|t| (t.id.clone(), Vec::new()))
            .collect();
        for token in tokens {
            let rows = sqlx::query(
                "SELECT timestamp, afp_mid, spread FROM metrics
                 WHERE token = ? AND timestamp >= ? AND timestamp <= ?
                 ORDER BY timestamp DESC",
            )
            .bind(&token.id)
            .bind(from as i64)
            .bind(to as i64)
            .fetch_all(&self.pool)
            .await?;
            let series = rows
                .iter()
                .map(|row| TokenMetricPoint {
                    timestamp: row.get::<i64, _>("timestamp") as u64,
                    afp_mid: row.get("afp_mid"),
                    spread: row.get("spread"),
                })
                .collect();
            result.insert(token.id.clone(), series);
        }
        Ok(result)
    }
}

/// Parse the strategy's write payload: `<token>_<afp_mid>_<spread>|...`.
pub fn parse_metric_payload(
    timestamp: Timestamp,
    payload: &str,
) -> Result<MetricEntry, String> {
    let mut data = HashMap::new();
    for token_data in payload.split('|') {
        let parts: Vec<&str> = token_data.split('_').collect();
        if parts.len() != 3 {
            return Err("submitted data is not in correct format".to_string());
        }
        let afp_mid = parts[1]
            .parse::<f64>()
            .map_err(|_| format!("Afp mid {} is not float64", parts[1]))?;
        let spread = parts[2]
            .parse::<f64>()
            .map_err(|_| format!("Spread {} is not float64", parts[2]))?;
        data.insert(parts[0].to_string(), TokenMetric { afp_mid, spread });
    }
    Ok(MetricEntry { timestamp, data })
}
