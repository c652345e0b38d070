// ABOUTME: Dependency wiring holding every shared component behind one Arc
// ABOUTME: Also owns the periodic sweep and retention background tasks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Server resources.
//!
//! One [`ServerResources`] is built at startup and shared with every route
//! handler. The pipeline is injected as a trait object so integration tests
//! can run the full admission sequence against a mock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::admission::AdmissionController;
use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::cost_gate::{CostGate, CostLimits};
use crate::database::food_items::FoodItemStore;
use crate::database::profiles::ProfileStore;
use crate::database::rate_limit_stats::RateLimitStore;
use crate::database::recipes::RecipeStore;
use crate::database::Database;
use crate::errors::AppResult;
use crate::persistence::RecipePersister;
use crate::pipeline::VideoPipeline;
use crate::quota::QuotaLedger;
use crate::rate_limit::RateGate;
use crate::single_flight::SingleFlightRegistry;
use crate::storage::ObjectStorage;

/// In-memory window sweep cadence
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Durable counter retention cleanup cadence
const RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Durable counter retention window
const RETENTION_WINDOW_DAYS: i64 = 7;

/// Everything a request handler needs, built once at startup
pub struct ServerResources {
    /// Server configuration
    pub config: ServerConfig,
    /// Relational store handle
    pub database: Database,
    /// Rate gate, shared with the background sweeper
    pub rate_gate: Arc<RateGate>,
    /// The admission controller driving both endpoints
    pub admission: AdmissionController,
}

impl ServerResources {
    /// Wire every component over the given pipeline implementation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the JWT secret is unusable.
    pub fn new(
        config: ServerConfig,
        database: Database,
        pipeline: Arc<dyn VideoPipeline>,
    ) -> AppResult<Self> {
        let authenticator = Authenticator::new(&config.supabase_jwt_secret, &config.jwt_issuer())?;

        let rate_store = RateLimitStore::new(database.pool().clone());
        let rate_gate = Arc::new(RateGate::new(rate_store));
        let cost_gate = CostGate::new(
            RateLimitStore::new(database.pool().clone()),
            CostLimits {
                daily_global: config.daily_global_limit,
                hourly_global: config.hourly_global_limit,
                daily_user: config.daily_user_limit,
            },
        );
        let quota = QuotaLedger::new(ProfileStore::new(database.pool().clone()));
        let persister = RecipePersister::new(
            RecipeStore::new(database.pool().clone()),
            FoodItemStore::new(database.pool().clone()),
            ObjectStorage::new(&config),
        );

        let admission = AdmissionController::new(
            authenticator,
            Arc::clone(&rate_gate),
            cost_gate,
            Arc::new(SingleFlightRegistry::new()),
            quota,
            pipeline,
            persister,
        );

        Ok(Self {
            config,
            database,
            rate_gate,
            admission,
        })
    }

    /// Spawn the periodic in-memory sweep and the durable retention cleanup
    pub fn start_background_tasks(self: &Arc<Self>) {
        let resources = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                resources.rate_gate.sweep_expired();
                debug!("rate window sweep complete");
            }
        });

        let store = RateLimitStore::new(self.database.pool().clone());
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RETENTION_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let cutoff = Utc::now() - chrono::Duration::days(RETENTION_WINDOW_DAYS);
                match store.delete_older_than(cutoff).await {
                    Ok(removed) if removed > 0 => {
                        debug!(removed, "rate counter retention cleanup complete");
                    }
                    Ok(_) => {}
                    Err(e) => warn!("rate counter retention cleanup failed: {e}"),
                }
            }
        });
    }
}
