// ABOUTME: Three-scope sliding-minute rate gate with block memory and durable mirrors
// ABOUTME: Evaluates global, IP, and user scopes in order with profile-specific limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Rate gate.
//!
//! Each endpoint profile carries three scopes evaluated global → IP → user.
//! Windows live in process memory; sticky blocks for the IP and user scopes
//! are mirrored into the durable store so they survive a restart. The global
//! scope is purely in-process: exceeding it yields 503, not a block. Durable
//! block lookups fail open: the in-memory window still enforces the
//! short-term cap when the store is down.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::database::rate_limit_stats::{RateLimitStore, IP_MINUTE, USER_MINUTE};
use crate::errors::{AppError, AppResult};

/// Limits for one scope of one profile
#[derive(Debug, Clone, Copy)]
pub struct ScopeConfig {
    /// Requests allowed inside one window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// Sticky block applied after the window is exceeded; `None` means the
    /// denial is transient (global scope)
    pub block_duration: Option<Duration>,
}

/// Per-endpoint rate profile
#[derive(Debug, Clone, Copy)]
pub struct RateProfile {
    /// Profile name, used to key in-memory windows
    pub name: &'static str,
    /// Per-user scope
    pub user: ScopeConfig,
    /// Per-IP scope
    pub ip: ScopeConfig,
    /// Process-global scope
    pub global: ScopeConfig,
}

const MINUTE: Duration = Duration::from_secs(60);

impl RateProfile {
    /// Standard profile for the analysis endpoint:
    /// user 10/min block 5 min, IP 20/min block 10 min, global 100/min.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            name: "analyze",
            user: ScopeConfig {
                max_requests: 10,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(5 * 60)),
            },
            ip: ScopeConfig {
                max_requests: 20,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(10 * 60)),
            },
            global: ScopeConfig {
                max_requests: 100,
                window: MINUTE,
                block_duration: None,
            },
        }
    }

    /// Strict profile for the generation endpoint:
    /// user 5/min block 15 min, IP 10/min block 15 min, global 50/min.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            name: "generate",
            user: ScopeConfig {
                max_requests: 5,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(15 * 60)),
            },
            ip: ScopeConfig {
                max_requests: 10,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(15 * 60)),
            },
            global: ScopeConfig {
                max_requests: 50,
                window: MINUTE,
                block_duration: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Ip,
    User,
}

impl Scope {
    const fn durable_kind(self) -> Option<&'static str> {
        match self {
            Self::Global => None,
            Self::Ip => Some(IP_MINUTE),
            Self::User => Some(USER_MINUTE),
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Ip => "ip",
            Self::User => "user",
        }
    }

    const fn blocked_code(self) -> &'static str {
        match self {
            // The global scope never produces a sticky block
            Self::Global => "SERVER_OVERLOADED",
            Self::Ip => "IP_BLOCKED",
            Self::User => "USER_BLOCKED",
        }
    }

    const fn exceeded_code(self) -> &'static str {
        match self {
            Self::Global => "SERVER_OVERLOADED",
            Self::Ip => "IP_RATE_LIMITED",
            Self::User => "RATE_LIMITED",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: DateTime<Utc>,
    window: Duration,
    blocked_until: Option<DateTime<Utc>>,
}

/// Headers emitted for the user scope on allowed requests
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    /// `X-RateLimit-Limit`
    pub limit: u32,
    /// `X-RateLimit-Remaining`
    pub remaining: u32,
    /// `X-RateLimit-Reset`, seconds until the window resets
    pub reset_secs: u64,
}

/// Three-scope sliding-minute rate gate
pub struct RateGate {
    store: RateLimitStore,
    entries: DashMap<String, WindowEntry>,
}

impl RateGate {
    /// Build a gate over the durable counter store
    #[must_use]
    pub fn new(store: RateLimitStore) -> Self {
        Self {
            store,
            entries: DashMap::new(),
        }
    }

    /// Evaluate all three scopes in order. Returns the user-scope header
    /// values on success.
    ///
    /// # Errors
    ///
    /// `SERVER_OVERLOADED` (503) when the global scope is exhausted;
    /// `IP_RATE_LIMITED` / `IP_BLOCKED` / `RATE_LIMITED` / `USER_BLOCKED`
    /// (429, with `Retry-After`) for the keyed scopes.
    pub async fn check(
        &self,
        profile: &RateProfile,
        user_id: Uuid,
        ip: &str,
    ) -> AppResult<RateLimitInfo> {
        let now = Utc::now();
        self.check_scope(profile.name, Scope::Global, &profile.global, "", now)
            .await?;
        self.check_scope(profile.name, Scope::Ip, &profile.ip, ip, now)
            .await?;
        let count = self
            .check_scope(
                profile.name,
                Scope::User,
                &profile.user,
                &user_id.to_string(),
                now,
            )
            .await?;

        Ok(RateLimitInfo {
            limit: profile.user.max_requests,
            remaining: profile.user.max_requests.saturating_sub(count),
            reset_secs: profile.user.window.as_secs(),
        })
    }

    /// One scope of the algorithm; returns the post-increment count on allow.
    async fn check_scope(
        &self,
        profile_name: &str,
        scope: Scope,
        config: &ScopeConfig,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u32> {
        let key = format!("{profile_name}:{}:{identifier}", scope.tag());

        // 1. Fast path: an in-process entry already reports a live block.
        if let Some(until) = self
            .entries
            .get(&key)
            .and_then(|entry| entry.blocked_until)
            .filter(|until| *until > now)
        {
            return Err(denial(scope.blocked_code(), until, now));
        }

        // 2. Durable block record, mirrored into memory when found. Store
        //    errors fall open: the in-memory window still caps the scope.
        if let Some(kind) = scope.durable_kind() {
            match self.store.find_active_block(kind, identifier, now).await {
                Ok(Some(until)) => {
                    if let Some(mut entry) = self.entries.get_mut(&key) {
                        entry.blocked_until = Some(until);
                    } else {
                        self.entries.insert(
                            key,
                            WindowEntry {
                                count: config.max_requests,
                                window_start: now,
                                window: config.window,
                                blocked_until: Some(until),
                            },
                        );
                    }
                    return Err(denial(scope.blocked_code(), until, now));
                }
                Ok(None) => {}
                Err(e) => warn!(scope = kind, identifier, "block lookup failed, continuing: {e}"),
            }
        }

        // 3. Roll the window.
        let (count, window_start) = {
            let mut entry = self.entries.entry(key.clone()).or_insert(WindowEntry {
                count: 0,
                window_start: now,
                window: config.window,
                blocked_until: None,
            });
            if now.signed_duration_since(entry.window_start).to_std().ok()
                >= Some(config.window)
            {
                entry.count = 1;
                entry.window_start = now;
            } else {
                entry.count += 1;
            }
            entry.blocked_until = None;
            (entry.count, entry.window_start)
        };

        // 4. Over the limit: remember the block and mirror it durably.
        if count > config.max_requests {
            if let Some(block) = config.block_duration {
                let until = now
                    + chrono::Duration::from_std(block)
                        .unwrap_or_else(|_| chrono::Duration::seconds(60));
                if let Some(mut entry) = self.entries.get_mut(&key) {
                    entry.blocked_until = Some(until);
                }
                if let Some(kind) = scope.durable_kind() {
                    let period_start = now.format("%Y-%m-%dT%H:%M").to_string();
                    if let Err(e) = self
                        .store
                        .record_block(kind, identifier, &period_start, count, until)
                        .await
                    {
                        warn!(scope = kind, identifier, "block upsert failed: {e}");
                    }
                }
                return Err(denial(scope.exceeded_code(), until, now));
            }
            // Global scope: transient 503 until the window rolls over.
            let window = chrono::Duration::from_std(config.window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            let reset = window_start + window;
            return Err(AppError::Overloaded {
                retry_after_secs: seconds_until(reset, now),
            });
        }

        Ok(count)
    }

    /// Evict expired windows and elapsed blocks (run periodically, ~5 min)
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| {
            if entry.blocked_until.is_some_and(|until| until > now) {
                return true;
            }
            now.signed_duration_since(entry.window_start).to_std().ok() < Some(entry.window)
        });
    }

    /// Live snapshot for `/admin/stats`
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let now = Utc::now();
        let tracked = self.entries.len();
        let blocked = self
            .entries
            .iter()
            .filter(|entry| entry.blocked_until.is_some_and(|until| until > now))
            .count();
        json!({
            "tracked_windows": tracked,
            "active_blocks": blocked,
        })
    }
}

fn denial(code: &'static str, until: DateTime<Utc>, now: DateTime<Utc>) -> AppError {
    let retry_after_secs = seconds_until(until, now);
    if code == "SERVER_OVERLOADED" {
        return AppError::Overloaded { retry_after_secs };
    }
    AppError::RateDenied {
        code,
        message: format!("Too many requests. Retry in {retry_after_secs} seconds."),
        retry_after_secs,
    }
}

fn seconds_until(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    until
        .signed_duration_since(now)
        .num_seconds()
        .max(1)
        .unsigned_abs()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::database::Database;

    async fn gate() -> RateGate {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        RateGate::new(RateLimitStore::new(database.pool().clone()))
    }

    /// Tight profile so tests exercise boundaries without 100 calls
    const fn tiny_profile() -> RateProfile {
        RateProfile {
            name: "test",
            user: ScopeConfig {
                max_requests: 3,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(300)),
            },
            ip: ScopeConfig {
                max_requests: 5,
                window: MINUTE,
                block_duration: Some(Duration::from_secs(600)),
            },
            global: ScopeConfig {
                max_requests: 100,
                window: MINUTE,
                block_duration: None,
            },
        }
    }

    #[tokio::test]
    async fn exactly_max_requests_pass_then_denial() {
        let gate = gate().await;
        let profile = tiny_profile();
        let user = Uuid::new_v4();

        for i in 0..3 {
            let info = gate.check(&profile, user, "198.51.100.1").await.unwrap();
            assert_eq!(info.remaining, 3 - (i + 1));
        }
        let err = gate
            .check(&profile, user, "198.51.100.1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
        assert!(err.retry_after_secs().unwrap() > 0);

        // Subsequent requests hit the remembered block
        let err = gate
            .check(&profile, user, "198.51.100.1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "USER_BLOCKED");
    }

    #[tokio::test]
    async fn ip_scope_denies_before_user_scope() {
        let gate = gate().await;
        let profile = tiny_profile();

        // 5 distinct users use up the IP window
        for _ in 0..5 {
            gate.check(&profile, Uuid::new_v4(), "203.0.113.7")
                .await
                .unwrap();
        }
        let err = gate
            .check(&profile, Uuid::new_v4(), "203.0.113.7")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IP_RATE_LIMITED");
        let err = gate
            .check(&profile, Uuid::new_v4(), "203.0.113.7")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "IP_BLOCKED");
    }

    #[tokio::test]
    async fn global_scope_yields_overload_without_block() {
        let gate = gate().await;
        let profile = RateProfile {
            global: ScopeConfig {
                max_requests: 2,
                window: MINUTE,
                block_duration: None,
            },
            ..tiny_profile()
        };
        gate.check(&profile, Uuid::new_v4(), "192.0.2.1").await.unwrap();
        gate.check(&profile, Uuid::new_v4(), "192.0.2.2").await.unwrap();
        let err = gate
            .check(&profile, Uuid::new_v4(), "192.0.2.3")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SERVER_OVERLOADED");
    }

    #[tokio::test]
    async fn durable_block_survives_a_fresh_gate() {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        let store = RateLimitStore::new(database.pool().clone());
        let profile = tiny_profile();
        let user = Uuid::new_v4();

        let gate = RateGate::new(store.clone());
        for _ in 0..3 {
            gate.check(&profile, user, "198.51.100.2").await.unwrap();
        }
        assert!(gate.check(&profile, user, "198.51.100.2").await.is_err());

        // A new gate (fresh process memory) still sees the durable block
        let fresh = RateGate::new(store);
        let err = fresh
            .check(&profile, user, "198.51.100.2")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "USER_BLOCKED");
    }

    #[tokio::test]
    async fn sweep_evicts_expired_windows() {
        let gate = gate().await;
        let profile = tiny_profile();
        gate.check(&profile, Uuid::new_v4(), "198.51.100.3")
            .await
            .unwrap();
        assert!(gate.snapshot()["tracked_windows"].as_u64().unwrap() > 0);
        // Nothing has expired yet, so the sweep keeps the live windows
        gate.sweep_expired();
        assert!(gate.snapshot()["tracked_windows"].as_u64().unwrap() > 0);
    }
}
