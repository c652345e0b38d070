// ABOUTME: Analyze and generate route handlers delegating to the admission controller
// ABOUTME: Builds the success wire shape and the X-RateLimit response headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Recipe routes: `POST /analyze` and `POST /generate`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::admission::{AdmissionOutcome, AnalyzeBody, GenerateBody};
use crate::context::ServerResources;
use crate::errors::AppError;

/// Recipe analysis and generation routes
pub struct RecipeRoutes;

impl RecipeRoutes {
    /// Create the recipe routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/analyze", post(Self::handle_analyze))
            .route("/generate", post(Self::handle_generate))
            .with_state(resources)
    }

    async fn handle_analyze(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        Json(body): Json<AnalyzeBody>,
    ) -> Result<Response, AppError> {
        let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
        let outcome = resources.admission.analyze(&headers, &ip, body).await?;
        Ok(success_response(&outcome))
    }

    async fn handle_generate(
        State(resources): State<Arc<ServerResources>>,
        connect_info: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        Json(body): Json<GenerateBody>,
    ) -> Result<Response, AppError> {
        let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
        let outcome = resources.admission.generate(&headers, &ip, body).await?;
        Ok(success_response(&outcome))
    }
}

/// Client IP: proxy headers first, then the socket peer
fn client_ip(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_owned())
        })
        .or_else(|| connect_info.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Success shape: `{success, recipe, user_id}` plus the optional flags,
/// with the user-scope rate headers attached
fn success_response(outcome: &AdmissionOutcome) -> Response {
    let mut body = json!({
        "success": true,
        "recipe": outcome.recipe,
        "user_id": outcome.user_id,
    });
    if outcome.already_exists {
        body["alreadyExists"] = json!(true);
    }
    if outcome.duplicated {
        body["duplicated"] = json!(true);
    }
    if outcome.generated {
        body["generated"] = json!(true);
    }

    let mut response = (StatusCode::OK, Json(body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", u64::from(outcome.rate_info.limit)),
        ("x-ratelimit-remaining", u64::from(outcome.rate_info.remaining)),
        ("x-ratelimit-reset", outcome.rate_info.reset_secs),
    ] {
        if let Ok(header_value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, header_value);
        }
    }
    response
}
