// ABOUTME: Environment-only configuration loading and validation for the server
// ABOUTME: Reads identity, provider, limit, and admin settings with fail-fast validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Server configuration.
//!
//! Configuration is environment-only: [`ServerConfig::from_env`] reads every
//! recognized variable, applies defaults, and fails fast with a
//! `CONFIG_ERROR`-class message when a required secret is missing. No config
//! files are consulted.

use std::env;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Which AI vendor serves a given concern (text extraction or image generation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiVendor {
    /// OpenAI chat/images API
    OpenAi,
    /// Google Gemini generateContent API
    Gemini,
}

impl AiVendor {
    fn parse(value: &str) -> AppResult<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(AppError::config(format!(
                "unknown AI provider '{other}' (expected 'openai' or 'gemini')"
            ))),
        }
    }
}

/// Complete server configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listener port
    pub port: u16,
    /// Supabase project base URL (identity + storage)
    pub supabase_url: String,
    /// Symmetric secret used to verify bearer tokens (HS256)
    pub supabase_jwt_secret: String,
    /// Service-role key for storage uploads
    pub supabase_service_key: String,
    /// OpenAI API key (required when any provider is `openai`, and for transcription)
    pub openai_api_key: Option<String>,
    /// Gemini API key (required when any provider is `gemini`)
    pub gemini_api_key: Option<String>,
    /// Vendor answering recipe extraction/generation prompts
    pub ai_provider: AiVendor,
    /// Model override for the text provider
    pub ai_model: Option<String>,
    /// Vendor producing dish images
    pub image_provider: AiVendor,
    /// Model override for the image provider
    pub image_model: Option<String>,
    /// Daily cap on billable work across all users
    pub daily_global_limit: u32,
    /// Daily cap on billable work per user
    pub daily_user_limit: u32,
    /// Hourly cap on billable work across all users
    pub hourly_global_limit: u32,
    /// Shared secret for `/admin/stats`; endpoint denies everything when unset
    pub admin_api_key: Option<String>,
    /// Relational store connection string
    pub database_url: String,
    /// Directory for temporary audio files
    pub temp_dir: PathBuf,
    /// Path or name of the video downloader binary
    pub ytdlp_bin: String,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a required variable is missing or a
    /// numeric variable fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let port = parse_or("PORT", 3000)?;
        let supabase_url = required("SUPABASE_URL")?;
        let supabase_jwt_secret = required("SUPABASE_JWT_SECRET")?;
        let supabase_service_key = required("SUPABASE_SERVICE_KEY")?;

        let openai_api_key = optional("OPENAI_API_KEY");
        let gemini_api_key = optional("GEMINI_API_KEY");

        let ai_provider = match optional("AI_PROVIDER") {
            Some(value) => AiVendor::parse(&value)?,
            None => AiVendor::OpenAi,
        };
        let image_provider = match optional("IMAGE_PROVIDER") {
            Some(value) => AiVendor::parse(&value)?,
            None => ai_provider,
        };

        let config = Self {
            port,
            supabase_url: supabase_url.trim_end_matches('/').to_owned(),
            supabase_jwt_secret,
            supabase_service_key,
            openai_api_key,
            gemini_api_key,
            ai_provider,
            ai_model: optional("AI_MODEL"),
            image_provider,
            image_model: optional("IMAGE_MODEL"),
            daily_global_limit: parse_or("DAILY_GLOBAL_LIMIT", 500)?,
            daily_user_limit: parse_or("DAILY_USER_LIMIT", 50)?,
            hourly_global_limit: parse_or("HOURLY_GLOBAL_LIMIT", 100)?,
            admin_api_key: optional("ADMIN_API_KEY"),
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:clipchef.db?mode=rwc".to_owned()),
            temp_dir: optional("TEMP_DIR").map_or_else(env::temp_dir, PathBuf::from),
            ytdlp_bin: optional("YTDLP_BIN").unwrap_or_else(|| "yt-dlp".to_owned()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Expected JWT issuer for bearer tokens
    #[must_use]
    pub fn jwt_issuer(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    fn validate(&self) -> AppResult<()> {
        if self.supabase_jwt_secret.len() < 16 {
            return Err(AppError::config(
                "SUPABASE_JWT_SECRET is too short to be a real signing secret",
            ));
        }
        let needs_openai = self.ai_provider == AiVendor::OpenAi
            || self.image_provider == AiVendor::OpenAi
            || self.openai_api_key.is_some();
        if needs_openai && self.openai_api_key.is_none() {
            return Err(AppError::config(
                "OPENAI_API_KEY is required when AI_PROVIDER or IMAGE_PROVIDER is 'openai'",
            ));
        }
        let needs_gemini =
            self.ai_provider == AiVendor::Gemini || self.image_provider == AiVendor::Gemini;
        if needs_gemini && self.gemini_api_key.is_none() {
            return Err(AppError::config(
                "GEMINI_API_KEY is required when AI_PROVIDER or IMAGE_PROVIDER is 'gemini'",
            ));
        }
        // Transcription always runs against the OpenAI speech endpoint
        if self.openai_api_key.is_none() {
            return Err(AppError::config(
                "OPENAI_API_KEY is required for audio transcription",
            ));
        }
        Ok(())
    }
}

fn required(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::config(format!("{name} must be set")))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{name} is not a valid number: {raw}"))),
        _ => Ok(default),
    }
}
