// ABOUTME: Read access to the master food table used by the fuzzy ingredient matcher
// ABOUTME: The table is external and read-only; inserts exist for test seeding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! `food_items` operations.

use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::FoodItem;

/// Store handle for the master food table
#[derive(Clone)]
pub struct FoodItemStore {
    pool: SqlitePool,
}

impl FoodItemStore {
    /// Wrap a pool handle
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Snapshot of the whole table in insertion order; the matcher's
    /// first-seen tie-break depends on this ordering being stable.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn list_all(&self) -> AppResult<Vec<FoodItem>> {
        let rows = sqlx::query("SELECT id, name FROM food_items ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("food item listing failed: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|row| FoodItem {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    /// Insert one food item (test seeding only; production rows are managed
    /// outside the core).
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn insert(&self, item: &FoodItem) -> AppResult<()> {
        sqlx::query("INSERT INTO food_items (id, name) VALUES ($1, $2)")
            .bind(&item.id)
            .bind(&item.name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("food item insert failed: {e}")))?;
        Ok(())
    }
}
