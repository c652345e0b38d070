// ABOUTME: Environment configuration loading tests, serialized around env mutation
// ABOUTME: Covers defaults, required secrets, and provider key validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;

use clipchef::config::{AiVendor, ServerConfig};
use clipchef::errors::AppError;
use serial_test::serial;

const ALL_VARS: &[&str] = &[
    "PORT",
    "SUPABASE_URL",
    "SUPABASE_JWT_SECRET",
    "SUPABASE_SERVICE_KEY",
    "OPENAI_API_KEY",
    "GEMINI_API_KEY",
    "AI_PROVIDER",
    "AI_MODEL",
    "IMAGE_PROVIDER",
    "IMAGE_MODEL",
    "DAILY_GLOBAL_LIMIT",
    "DAILY_USER_LIMIT",
    "HOURLY_GLOBAL_LIMIT",
    "ADMIN_API_KEY",
    "DATABASE_URL",
    "TEMP_DIR",
    "YTDLP_BIN",
];

fn reset_env() {
    for var in ALL_VARS {
        env::remove_var(var);
    }
    env::set_var("SUPABASE_URL", "https://test-project.supabase.co/");
    env::set_var("SUPABASE_JWT_SECRET", "0123456789abcdef0123456789abcdef");
    env::set_var("SUPABASE_SERVICE_KEY", "service-role-key");
    env::set_var("OPENAI_API_KEY", "sk-test");
}

#[test]
#[serial]
fn defaults_apply_when_optional_vars_are_absent() {
    reset_env();
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.port, 3000);
    assert_eq!(config.daily_global_limit, 500);
    assert_eq!(config.daily_user_limit, 50);
    assert_eq!(config.hourly_global_limit, 100);
    assert_eq!(config.ai_provider, AiVendor::OpenAi);
    // The image provider follows the text provider unless overridden
    assert_eq!(config.image_provider, AiVendor::OpenAi);
    // The trailing slash is trimmed so issuer/storage URLs compose cleanly
    assert_eq!(config.supabase_url, "https://test-project.supabase.co");
    assert_eq!(
        config.jwt_issuer(),
        "https://test-project.supabase.co/auth/v1"
    );
}

#[test]
#[serial]
fn missing_jwt_secret_is_fatal() {
    reset_env();
    env::remove_var("SUPABASE_JWT_SECRET");
    assert!(matches!(
        ServerConfig::from_env(),
        Err(AppError::Config(_))
    ));
}

#[test]
#[serial]
fn gemini_provider_requires_its_key() {
    reset_env();
    env::set_var("AI_PROVIDER", "gemini");
    assert!(matches!(
        ServerConfig::from_env(),
        Err(AppError::Config(_))
    ));

    env::set_var("GEMINI_API_KEY", "gm-test");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.ai_provider, AiVendor::Gemini);
    assert_eq!(config.image_provider, AiVendor::Gemini);
}

#[test]
#[serial]
fn numeric_overrides_are_parsed() {
    reset_env();
    env::set_var("PORT", "8080");
    env::set_var("DAILY_USER_LIMIT", "5");
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.daily_user_limit, 5);

    env::set_var("PORT", "not-a-port");
    assert!(matches!(
        ServerConfig::from_env(),
        Err(AppError::Config(_))
    ));
}
