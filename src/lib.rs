// ABOUTME: Main library entry point for the Clipchef recipe service
// ABOUTME: Admission gates, pipeline orchestration, and persistence for video recipes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

#![deny(unsafe_code)]

//! # Clipchef
//!
//! An HTTP service that turns short social-media cooking videos (and free-form
//! user preferences) into structured, persisted recipes. The core is the
//! request-admission layer sitting between the HTTP surface and the external
//! collaborators, enforcing five guarantees for every accepted request:
//!
//! - authenticated identity (bearer token),
//! - multi-scope rate limits (per-user, per-IP, global, plus cost counters),
//! - per-user single-flight on video analysis,
//! - cross-user de-duplication and owner-scoped idempotence,
//! - a free-generation quota debited only on truly new work.
//!
//! ## Architecture
//!
//! Control flow is strictly linear per request: the admission controller runs
//! authenticate → rate gate → cost gate → validate → single-flight →
//! idempotence → quota → pipeline → persistence → debit → release. No
//! component calls back into an earlier one.
//!
//! ## Example
//!
//! ```rust,no_run
//! use clipchef::config::ServerConfig;
//! use clipchef::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("clipchef configured on port {}", config.port);
//!     Ok(())
//! }
//! ```

/// Request admission sequencing for the analyze and generate flows
pub mod admission;

/// Bearer-token authentication and identity extraction
pub mod auth;

/// Environment-only configuration loading
pub mod config;

/// Shared server resources and background tasks
pub mod context;

/// Hourly/daily cost counters with fail-open semantics
pub mod cost_gate;

/// Relational store access (recipes, profiles, food items, counters)
pub mod database;

/// Unified error handling with standard codes and HTTP responses
pub mod errors;

/// Fuzzy ingredient-to-food-item linking
pub mod food_matching;

/// LLM provider abstraction for extraction, generation, and dish images
pub mod llm;

/// Common data models for recipes, platforms, and identities
pub mod models;

/// Recipe persistence with thumbnail upload and child batches
pub mod persistence;

/// Pipeline orchestration from video URL to normalized recipe draft
pub mod pipeline;

/// Platform handler registry (TikTok, YouTube, Instagram)
pub mod platforms;

/// Free-generation quota ledger
pub mod quota;

/// Three-scope sliding-minute rate gate
pub mod rate_limit;

/// HTTP routes
pub mod routes;

/// Per-user single-flight registry
pub mod single_flight;

/// Object store client for recipe images
pub mod storage;

/// Speech-to-text client
pub mod transcription;

/// Closed per-language vocabularies
pub mod vocab;
