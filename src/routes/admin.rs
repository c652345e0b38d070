// ABOUTME: Admin stats route guarded by a shared header secret
// ABOUTME: Exposes live rate-gate and cost-gate snapshots
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Admin route: `GET /admin/stats` with the `x-admin-key` header.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::context::ServerResources;
use crate::errors::AppError;

/// Admin routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create the admin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/admin/stats", get(Self::handle_stats))
            .with_state(resources)
    }

    async fn handle_stats(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AppError> {
        let provided = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
        // An unset admin key denies everything rather than opening the endpoint
        let expected = resources.config.admin_api_key.as_deref();
        match (provided, expected) {
            (Some(provided), Some(expected)) if provided == expected => {}
            _ => return Err(AppError::Forbidden),
        }

        Ok(Json(resources.admission.gate_snapshot().await))
    }
}
