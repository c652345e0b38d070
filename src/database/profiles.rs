// ABOUTME: Profile reads and quota decrements for premium status and free generations
// ABOUTME: Rows are owned by the identity provider; the core only reads and debits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! `profiles` operations.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::Profile;

/// Default free generations granted when a profile row is first seen
const DEFAULT_FREE_GENERATIONS: i64 = 3;

/// Store handle for user profiles
#[derive(Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    /// Wrap a pool handle
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a profile, creating the row with defaults when the identity
    /// provider has not synced it yet.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn get_or_create(&self, user_id: Uuid) -> AppResult<Profile> {
        sqlx::query(
            "INSERT INTO profiles (user_id, is_premium, free_generations_remaining, created_at)
             VALUES ($1, 0, $2, $3)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(DEFAULT_FREE_GENERATIONS)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("profile upsert failed: {e}")))?;

        let row = sqlx::query(
            "SELECT is_premium, free_generations_remaining FROM profiles WHERE user_id = $1",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("profile read failed: {e}")))?;

        Ok(Profile {
            user_id,
            is_premium: row.get::<i64, _>("is_premium") != 0,
            free_generations_remaining: row.get("free_generations_remaining"),
        })
    }

    /// Decrement the free-generation counter, guarded so it never goes
    /// negative. Returns whether a row actually changed.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn decrement_free_generations(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles
             SET free_generations_remaining = free_generations_remaining - 1
             WHERE user_id = $1 AND is_premium = 0 AND free_generations_remaining > 0",
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("quota debit failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite premium status and remaining generations (test and admin
    /// tooling; production rows come from the identity provider).
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn set_quota(
        &self,
        user_id: Uuid,
        is_premium: bool,
        free_generations_remaining: i64,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, is_premium, free_generations_remaining, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id)
             DO UPDATE SET is_premium = excluded.is_premium,
                           free_generations_remaining = excluded.free_generations_remaining",
        )
        .bind(user_id.to_string())
        .bind(i64::from(is_premium))
        .bind(free_generations_remaining)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("profile write failed: {e}")))?;
        Ok(())
    }
}
