// ABOUTME: Free-generation quota ledger reading premium status and debiting new work
// ABOUTME: Debit never raises; losing one degrades revenue protection, not correctness
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Quota ledger.
//!
//! A non-premium user may perform `free_generations_remaining` billable
//! generations. The debit runs exactly once per billable request, after
//! successful persistence. Premium users are never decremented.

use tracing::warn;
use uuid::Uuid;

use crate::database::profiles::ProfileStore;
use crate::errors::AppResult;

/// Result of a quota check
#[derive(Debug, Clone, Copy)]
pub struct QuotaStatus {
    /// Whether new billable work may start
    pub allowed: bool,
    /// Premium subscribers bypass the counter
    pub is_premium: bool,
    /// Remaining free generations
    pub free_remaining: i64,
}

/// Reads premium status and debits free generations
#[derive(Clone)]
pub struct QuotaLedger {
    profiles: ProfileStore,
}

impl QuotaLedger {
    /// Build a ledger over the profile store
    #[must_use]
    pub const fn new(profiles: ProfileStore) -> Self {
        Self { profiles }
    }

    /// Check whether the user may start new billable work.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn can_generate(&self, user_id: Uuid) -> AppResult<QuotaStatus> {
        let profile = self.profiles.get_or_create(user_id).await?;
        Ok(QuotaStatus {
            allowed: profile.is_premium || profile.free_generations_remaining > 0,
            is_premium: profile.is_premium,
            free_remaining: profile.free_generations_remaining,
        })
    }

    /// Debit one free generation. Never raises: a lost debit degrades revenue
    /// protection, not the correctness of the returned artifact.
    pub async fn debit(&self, user_id: Uuid) {
        match self.profiles.decrement_free_generations(user_id).await {
            Ok(true) => {}
            Ok(false) => {
                // Premium user or counter already at zero; nothing to debit.
            }
            Err(e) => {
                warn!(%user_id, "quota debit failed, continuing: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::database::Database;

    async fn ledger() -> (QuotaLedger, ProfileStore) {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        let profiles = ProfileStore::new(database.pool().clone());
        (QuotaLedger::new(profiles.clone()), profiles)
    }

    #[tokio::test]
    async fn exhausted_quota_blocks_non_premium() {
        let (ledger, profiles) = ledger().await;
        let user = Uuid::new_v4();
        profiles.set_quota(user, false, 0).await.unwrap();

        let status = ledger.can_generate(user).await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.free_remaining, 0);
    }

    #[tokio::test]
    async fn premium_is_always_allowed_and_never_debited() {
        let (ledger, profiles) = ledger().await;
        let user = Uuid::new_v4();
        profiles.set_quota(user, true, 0).await.unwrap();

        assert!(ledger.can_generate(user).await.unwrap().allowed);
        ledger.debit(user).await;
        let status = ledger.can_generate(user).await.unwrap();
        assert_eq!(status.free_remaining, 0);
        assert!(status.is_premium);
    }

    #[tokio::test]
    async fn debit_decrements_by_exactly_one() {
        let (ledger, profiles) = ledger().await;
        let user = Uuid::new_v4();
        profiles.set_quota(user, false, 3).await.unwrap();

        ledger.debit(user).await;
        assert_eq!(ledger.can_generate(user).await.unwrap().free_remaining, 2);
    }
}
