// ABOUTME: Relational store connection handling and schema bootstrap
// ABOUTME: Owns the SQLite pool shared by the recipe, profile, food, and counter stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Relational store access.
//!
//! One [`Database`] wraps the connection pool; domain-specific stores
//! ([`recipes::RecipeStore`], [`profiles::ProfileStore`],
//! [`food_items::FoodItemStore`], [`rate_limit_stats::RateLimitStore`]) are
//! cheap handles over clones of the same pool. Schema bootstrap is
//! code-driven: [`Database::migrate`] creates every table and index if absent
//! and seeds nothing.

pub mod food_items;
pub mod profiles;
pub mod rate_limit_stats;
pub mod recipes;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};

/// Shared handle on the relational store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and run schema bootstrap.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid, the pool cannot be
    /// established, or a bootstrap statement fails.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every pooled connection to an in-memory database would see its own
        // empty database, so those pools are capped at one connection.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 8 })
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("failed to connect: {e}")))?;
        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    /// Create all tables and indexes if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error when a DDL statement fails.
    pub async fn migrate(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("migration failed: {e}")))?;
        }
        Ok(())
    }

    /// Borrow the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Liveness probe used by `/health`
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        email TEXT,
        is_premium INTEGER NOT NULL DEFAULT 0,
        free_generations_remaining INTEGER NOT NULL DEFAULT 3,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS recipes (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        source_url TEXT,
        platform TEXT NOT NULL,
        prep_time INTEGER,
        cook_time INTEGER,
        total_time INTEGER,
        servings INTEGER,
        cuisine_origin TEXT,
        meal_type TEXT,
        diet_type TEXT,
        calories REAL,
        proteins REAL,
        carbs REAL,
        fats REAL,
        equipment TEXT,
        image_url TEXT,
        generation_mode TEXT NOT NULL DEFAULT 'free'
    )",
    "CREATE INDEX IF NOT EXISTS idx_recipes_user_created
        ON recipes (user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_recipes_source_url ON recipes (source_url)",
    "CREATE TABLE IF NOT EXISTS ingredients (
        id TEXT PRIMARY KEY,
        recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        quantity REAL,
        unit TEXT,
        food_item_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients (recipe_id)",
    "CREATE TABLE IF NOT EXISTS steps (
        id TEXT PRIMARY KEY,
        recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        step_order INTEGER NOT NULL,
        text TEXT NOT NULL,
        duration INTEGER,
        temperature INTEGER,
        ingredients_used TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_steps_recipe ON steps (recipe_id)",
    "CREATE TABLE IF NOT EXISTS food_items (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS rate_limit_stats (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        identifier TEXT NOT NULL DEFAULT '',
        period_start TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        blocked_until TEXT,
        updated_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_rate_limit_scope
        ON rate_limit_stats (type, identifier, period_start)",
];

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        database.migrate().await.unwrap();
        assert!(database.ping().await);
    }
}
