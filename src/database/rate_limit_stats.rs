// ABOUTME: Durable rate and cost counters with atomic upsert-with-increment
// ABOUTME: Backs the rate gate's sticky blocks and the cost gate's period counters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Durable `rate_limit_stats` operations.
//!
//! One row per `(type, identifier, period_start)`; the unique index makes the
//! upsert-with-increment atomic. Rows are append-only within their period; a
//! retention job deletes old rows.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Counter type for the global daily cap
pub const DAILY_GLOBAL: &str = "daily_global";
/// Counter type for the global hourly cap
pub const HOURLY_GLOBAL: &str = "hourly_global";
/// Counter type for the per-user daily cap
pub const DAILY_USER: &str = "daily_user";
/// Counter type for per-IP minute windows and blocks
pub const IP_MINUTE: &str = "ip_minute";
/// Counter type for per-user minute windows and blocks
pub const USER_MINUTE: &str = "user_minute";

/// Key addressing one durable counter row
#[derive(Debug, Clone)]
pub struct CounterKey {
    /// Counter type (one of the constants above)
    pub kind: &'static str,
    /// `""` for global scopes, user id or IP literal otherwise
    pub identifier: String,
    /// Wall-clock period start, e.g. `2026-08-01` or `2026-08-01T14:00`
    pub period_start: String,
}

/// Store handle for durable counters and block records
#[derive(Clone)]
pub struct RateLimitStore {
    pool: SqlitePool,
}

impl RateLimitStore {
    /// Wrap a pool handle
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up an active block for the scope, if any.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure; callers treat that as "no block"
    /// (fail open) while the in-memory window still enforces the short cap.
    pub async fn find_active_block(
        &self,
        kind: &str,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT blocked_until FROM rate_limit_stats
             WHERE type = $1 AND identifier = $2 AND blocked_until IS NOT NULL
             ORDER BY blocked_until DESC LIMIT 1",
        )
        .bind(kind)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("block lookup failed: {e}")))?;

        Ok(row
            .and_then(|r| r.get::<Option<String>, _>("blocked_until"))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|until| *until > now))
    }

    /// Record (or extend) a block for the scope, creating the period row when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn record_block(
        &self,
        kind: &str,
        identifier: &str,
        period_start: &str,
        count: u32,
        blocked_until: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO rate_limit_stats (id, type, identifier, period_start, count, blocked_until, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (type, identifier, period_start)
             DO UPDATE SET count = excluded.count,
                           blocked_until = excluded.blocked_until,
                           updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind)
        .bind(identifier)
        .bind(period_start)
        .bind(i64::from(count))
        .bind(blocked_until.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("block upsert failed: {e}")))?;
        Ok(())
    }

    /// Read the current count for one period row; absent rows read as 0.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn read_count(
        &self,
        kind: &str,
        identifier: &str,
        period_start: &str,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT count FROM rate_limit_stats
             WHERE type = $1 AND identifier = $2 AND period_start = $3",
        )
        .bind(kind)
        .bind(identifier)
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("counter read failed: {e}")))?;
        Ok(row.map_or(0, |r| r.get::<i64, _>("count")))
    }

    /// Atomically increment every given counter in one transaction, creating
    /// missing rows at count 1. Returns the post-increment counts in input
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure; the transaction rolls back and no
    /// counter moves.
    pub async fn increment_counters(&self, keys: &[CounterKey]) -> AppResult<Vec<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("failed to begin transaction: {e}")))?;

        let now = Utc::now().to_rfc3339();
        let mut counts = Vec::with_capacity(keys.len());
        for key in keys {
            let row = sqlx::query(
                "INSERT INTO rate_limit_stats (id, type, identifier, period_start, count, updated_at)
                 VALUES ($1, $2, $3, $4, 1, $5)
                 ON CONFLICT (type, identifier, period_start)
                 DO UPDATE SET count = count + 1, updated_at = excluded.updated_at
                 RETURNING count",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(key.kind)
            .bind(&key.identifier)
            .bind(&key.period_start)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("counter increment failed: {e}")))?;
            counts.push(row.get::<i64, _>("count"));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("failed to commit counters: {e}")))?;
        Ok(counts)
    }

    /// Delete rows last touched before the cutoff. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_stats WHERE updated_at < $1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("retention cleanup failed: {e}")))?;
        Ok(result.rows_affected())
    }
}
