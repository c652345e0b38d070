// ABOUTME: Unified error handling system with standard error codes and HTTP responses
// ABOUTME: Maps every domain failure to the wire-level {success:false, error, message} shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Application-wide error type.
//!
//! Each component raises an [`AppError`] carrying a stable error code and a
//! localized message; the admission layer owns the translation to HTTP via the
//! [`IntoResponse`] implementation. Denial variants carry their retry hint or
//! remaining headroom so callers never need to recompute them.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error
#[derive(Debug, Error)]
pub enum AppError {
    /// Request validation failure (missing URL, unknown language, bad preference sets)
    #[error("{message}")]
    InvalidInput {
        /// Stable wire code, e.g. `URL_MISSING`
        code: &'static str,
        /// Localized message surfaced verbatim to the caller
        message: String,
    },

    /// No bearer credential on the request
    #[error("missing bearer credential")]
    AuthMissing,

    /// Signature, issuer, or token format invalid
    #[error("{0}")]
    AuthInvalid(String),

    /// Token expiration claim is in the past
    #[error("token expired")]
    AuthExpired,

    /// Rate gate denial (minute windows and sticky blocks)
    #[error("{message}")]
    RateDenied {
        /// Stable wire code, e.g. `IP_BLOCKED`
        code: &'static str,
        /// Localized denial message
        message: String,
        /// Seconds until the window or block elapses
        retry_after_secs: u64,
    },

    /// Cost gate denial (hourly/daily counters)
    #[error("{message}")]
    CostDenied {
        /// Stable wire code, e.g. `HOURLY_LIMIT_REACHED`
        code: &'static str,
        /// Localized denial message
        message: String,
        /// The scope that triggered the denial
        scope: &'static str,
        /// Configured limit for that scope
        limit: u32,
        /// Remaining headroom (always 0 on denial, kept for the wire shape)
        remaining: u32,
    },

    /// Single-flight conflict: the user already has an analysis in progress
    #[error("analysis already in progress")]
    AnalysisInProgress {
        /// The URL currently being analyzed for this user
        locked_url: String,
    },

    /// Free-generation quota exhausted
    #[error("{0}")]
    PremiumRequired(String),

    /// Admin key mismatch
    #[error("admin key mismatch")]
    Forbidden,

    /// The LLM determined the content is non-culinary
    #[error("{0}")]
    NotRecipe(String),

    /// Global rate scope exceeded
    #[error("server overloaded")]
    Overloaded {
        /// Seconds until the global window resets
        retry_after_secs: u64,
    },

    /// An external collaborator (downloader, speech-to-text, LLM, object store) failed
    #[error("{service}: {message}")]
    ExternalService {
        /// Name of the collaborator, e.g. "yt-dlp"
        service: &'static str,
        /// Underlying failure description
        message: String,
    },

    /// Relational store failure
    #[error("database error: {0}")]
    Database(String),

    /// Fatal misconfiguration (missing secret, bad env value)
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Validation failure with an explicit wire code
    pub fn invalid_input(code: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
        }
    }

    /// Invalid credential
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::AuthInvalid(message.into())
    }

    /// External collaborator failure
    pub fn external_service(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Relational store failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Fatal misconfiguration
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Internal invariant violation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable wire-level error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { code, .. }
            | Self::RateDenied { code, .. }
            | Self::CostDenied { code, .. } => *code,
            Self::AuthMissing => "AUTH_MISSING",
            Self::AuthInvalid(_) => "AUTH_INVALID",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::AnalysisInProgress { .. } => "ANALYSIS_IN_PROGRESS",
            Self::PremiumRequired(_) => "PREMIUM_REQUIRED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotRecipe(_) => "NOT_RECIPE",
            Self::Overloaded { .. } => "SERVER_OVERLOADED",
            Self::ExternalService { .. } => "PROVIDER_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } | Self::NotRecipe(_) => StatusCode::BAD_REQUEST,
            Self::AuthMissing | Self::AuthInvalid(_) | Self::AuthExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::PremiumRequired(_) | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateDenied { .. } | Self::CostDenied { .. } | Self::AnalysisInProgress { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalService { .. }
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Retry hint in seconds, when the denial carries one
    #[must_use]
    pub const fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateDenied {
                retry_after_secs, ..
            }
            | Self::Overloaded {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.code(),
            "message": self.to_string(),
        });

        // Contextual fields per error kind
        match &self {
            Self::NotRecipe(message) => {
                body["userMessage"] = json!(message);
            }
            Self::AnalysisInProgress { locked_url } => {
                body["lockedUrl"] = json!(locked_url);
            }
            Self::CostDenied {
                scope,
                limit,
                remaining,
                ..
            } => {
                body["scope"] = json!(scope);
                body["limit"] = json!(limit);
                body["remaining"] = json!(remaining);
            }
            _ => {}
        }
        if let Some(secs) = self.retry_after_secs() {
            body["retryAfter"] = json!(secs);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
