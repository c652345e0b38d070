// ABOUTME: Route module organization and top-level router assembly
// ABOUTME: Thin handlers delegating to the admission controller and gates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! HTTP routes.
//!
//! Each domain module contains only route definitions and thin handlers that
//! delegate to the admission controller. [`router`] assembles the full
//! application with permissive CORS and request tracing.

pub mod admin;
pub mod health;
pub mod recipes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::ServerResources;

pub use admin::AdminRoutes;
pub use health::HealthRoutes;
pub use recipes::RecipeRoutes;

/// Assemble the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(RecipeRoutes::routes(Arc::clone(&resources)))
        .merge(AdminRoutes::routes(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
