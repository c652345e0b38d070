// ABOUTME: Hourly and daily cost counters with short-TTL cache and fail-open semantics
// ABOUTME: Denies with the most specific scope and increments all three atomically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Cost gate.
//!
//! Three counters per request: `daily_global`, `hourly_global`, and
//! `daily_user`. Period starts are wall-clock (local midnight, top of the
//! hour). Reads go through a ~5 s cache; correctness is ultimately enforced by
//! the durable layer, so brief staleness is tolerated. On any store error the
//! gate fails open: availability is preferred over blocking on a counter
//! outage, with the rate gate and quota ledger still bounding damage.

use std::time::{Duration, Instant};

use chrono::Local;
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use crate::database::rate_limit_stats::{
    CounterKey, RateLimitStore, DAILY_GLOBAL, DAILY_USER, HOURLY_GLOBAL,
};
use crate::errors::{AppError, AppResult};

const CACHE_TTL: Duration = Duration::from_secs(5);
const ALERT_THRESHOLD: f64 = 0.8;

/// Configured caps for the three scopes
#[derive(Debug, Clone, Copy)]
pub struct CostLimits {
    /// All billable work per day, across users
    pub daily_global: u32,
    /// All billable work per hour, across users
    pub hourly_global: u32,
    /// Billable work per user per day
    pub daily_user: u32,
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    count: i64,
    fetched_at: Instant,
}

/// Durable cost counters behind a short-TTL read cache
pub struct CostGate {
    store: RateLimitStore,
    limits: CostLimits,
    cache: DashMap<String, CachedCount>,
}

impl CostGate {
    /// Build a gate over the durable counter store
    #[must_use]
    pub fn new(store: RateLimitStore, limits: CostLimits) -> Self {
        Self {
            store,
            limits,
            cache: DashMap::new(),
        }
    }

    /// Admit one billable request: deny when a counter is exhausted,
    /// otherwise increment all three counters atomically.
    ///
    /// # Errors
    ///
    /// Only denial errors (`HOURLY_LIMIT_REACHED`, `DAILY_LIMIT_REACHED`,
    /// `USER_DAILY_LIMIT_REACHED`). Store failures never surface: the request
    /// proceeds and the failure is logged.
    pub async fn admit(&self, user_id: Uuid) -> AppResult<()> {
        let day = Local::now().format("%Y-%m-%d").to_string();
        let hour = Local::now().format("%Y-%m-%dT%H:00").to_string();
        let user = user_id.to_string();

        let hourly = self.read_cached(HOURLY_GLOBAL, "", &hour).await;
        let daily = self.read_cached(DAILY_GLOBAL, "", &day).await;
        let daily_user = self.read_cached(DAILY_USER, &user, &day).await;

        // Most specific denial first: hourly, then daily global, then daily user.
        match (hourly, daily, daily_user) {
            (Some(count), _, _) if count >= i64::from(self.limits.hourly_global) => {
                return Err(cost_denial(
                    "HOURLY_LIMIT_REACHED",
                    "hourly_global",
                    self.limits.hourly_global,
                    count,
                ));
            }
            (_, Some(count), _) if count >= i64::from(self.limits.daily_global) => {
                return Err(cost_denial(
                    "DAILY_LIMIT_REACHED",
                    "daily_global",
                    self.limits.daily_global,
                    count,
                ));
            }
            (_, _, Some(count)) if count >= i64::from(self.limits.daily_user) => {
                return Err(cost_denial(
                    "USER_DAILY_LIMIT_REACHED",
                    "daily_user",
                    self.limits.daily_user,
                    count,
                ));
            }
            _ => {}
        }

        let keys = [
            CounterKey {
                kind: DAILY_GLOBAL,
                identifier: String::new(),
                period_start: day.clone(),
            },
            CounterKey {
                kind: HOURLY_GLOBAL,
                identifier: String::new(),
                period_start: hour.clone(),
            },
            CounterKey {
                kind: DAILY_USER,
                identifier: user.clone(),
                period_start: day.clone(),
            },
        ];
        match self.store.increment_counters(&keys).await {
            Ok(counts) => {
                if let Some(daily_count) = counts.first() {
                    let threshold =
                        (f64::from(self.limits.daily_global) * ALERT_THRESHOLD) as i64;
                    if *daily_count >= threshold {
                        warn!(
                            count = daily_count,
                            limit = self.limits.daily_global,
                            "daily global cost counter approaching its limit"
                        );
                    }
                }
            }
            Err(e) => {
                error!("cost counter increment failed, admitting request anyway: {e}");
            }
        }

        self.cache.remove(&cache_key(HOURLY_GLOBAL, "", &hour));
        self.cache.remove(&cache_key(DAILY_GLOBAL, "", &day));
        self.cache.remove(&cache_key(DAILY_USER, &user, &day));
        Ok(())
    }

    /// Cached counter read; `None` means the store failed (treated as
    /// unbounded, so the gate fails open).
    async fn read_cached(&self, kind: &'static str, identifier: &str, period: &str) -> Option<i64> {
        let key = cache_key(kind, identifier, period);
        if let Some(cached) = self.cache.get(&key) {
            if cached.fetched_at.elapsed() < CACHE_TTL {
                return Some(cached.count);
            }
        }
        match self.store.read_count(kind, identifier, period).await {
            Ok(count) => {
                self.cache.insert(
                    key,
                    CachedCount {
                        count,
                        fetched_at: Instant::now(),
                    },
                );
                Some(count)
            }
            Err(e) => {
                error!(kind, identifier, "cost counter read failed, failing open: {e}");
                None
            }
        }
    }

    /// Live snapshot for `/admin/stats`
    pub async fn snapshot(&self) -> Value {
        let day = Local::now().format("%Y-%m-%d").to_string();
        let hour = Local::now().format("%Y-%m-%dT%H:00").to_string();
        let daily = self.store.read_count(DAILY_GLOBAL, "", &day).await.ok();
        let hourly = self.store.read_count(HOURLY_GLOBAL, "", &hour).await.ok();
        json!({
            "daily_global": { "count": daily, "limit": self.limits.daily_global },
            "hourly_global": { "count": hourly, "limit": self.limits.hourly_global },
            "daily_user_limit": self.limits.daily_user,
        })
    }
}

fn cache_key(kind: &str, identifier: &str, period: &str) -> String {
    format!("{kind}:{identifier}:{period}")
}

fn cost_denial(code: &'static str, scope: &'static str, limit: u32, count: i64) -> AppError {
    let remaining = i64::from(limit).saturating_sub(count).max(0) as u32;
    AppError::CostDenied {
        code,
        message: format!("Generation limit reached for scope '{scope}'."),
        scope,
        limit,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::database::Database;

    async fn gate(limits: CostLimits) -> (CostGate, Database) {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        let store = RateLimitStore::new(database.pool().clone());
        (CostGate::new(store, limits), database)
    }

    const SMALL: CostLimits = CostLimits {
        daily_global: 100,
        hourly_global: 100,
        daily_user: 2,
    };

    #[tokio::test]
    async fn user_cap_is_exact() {
        let (gate, _db) = gate(SMALL).await;
        let user = Uuid::new_v4();
        gate.admit(user).await.unwrap();
        gate.admit(user).await.unwrap();
        let err = gate.admit(user).await.unwrap_err();
        assert_eq!(err.code(), "USER_DAILY_LIMIT_REACHED");

        // Another user still has headroom
        gate.admit(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn hourly_denial_wins_over_daily_user() {
        let (gate, _db) = gate(CostLimits {
            daily_global: 100,
            hourly_global: 1,
            daily_user: 1,
        })
        .await;
        let user = Uuid::new_v4();
        gate.admit(user).await.unwrap();
        let err = gate.admit(user).await.unwrap_err();
        assert_eq!(err.code(), "HOURLY_LIMIT_REACHED");
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let (gate, database) = gate(SMALL).await;
        sqlx::query("DROP TABLE rate_limit_stats")
            .execute(database.pool())
            .await
            .unwrap();
        // Reads and increments both fail; the request is still admitted.
        gate.admit(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn cache_invalidation_keeps_counts_fresh() {
        let (gate, _db) = gate(SMALL).await;
        let user = Uuid::new_v4();
        gate.admit(user).await.unwrap();
        gate.admit(user).await.unwrap();
        // Without invalidation the 5 s cache would still report count 0 here.
        assert!(gate.admit(user).await.is_err());
    }
}
