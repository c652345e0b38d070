// ABOUTME: Admission controller enforcing the fixed gate order for analyze and generate
// ABOUTME: Owns validation, idempotence resolution, quota debits, and scoped lock release
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Admission control.
//!
//! Exact sequence per analysis request: authenticate, rate gate, cost gate,
//! validate input, owner-duplicate lookup, single-flight acquire,
//! global-duplicate clone, quota check, pipeline, persistence, quota debit,
//! release, respond. The generation endpoint runs the same sequence minus the
//! two duplicate lookups. The single-flight lock is released on every exit
//! path after acquisition (guard drop), then the structured outcome log is
//! emitted.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Authenticator};
use crate::cost_gate::CostGate;
use crate::errors::{AppError, AppResult};
use crate::models::{
    normalize_source_url, GenerationMode, GenerationPreferences, Language, Platform, Recipe,
};
use crate::persistence::{ImageSource, RecipePersister};
use crate::pipeline::VideoPipeline;
use crate::quota::QuotaLedger;
use crate::rate_limit::{RateGate, RateLimitInfo, RateProfile};
use crate::single_flight::SingleFlightRegistry;
use crate::vocab;

/// Lock key used by the generation flow, which has no source URL
const GENERATED_LOCK_KEY: &str = "generated";
/// Upper bound on user-supplied list lengths
const MAX_LIST_ITEMS: usize = 30;

/// Raw `/analyze` request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    /// Video URL to analyze
    pub url: Option<String>,
    /// Requested language, defaults to French
    pub language: Option<String>,
}

/// Raw `/generate` request body
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Requested meal type
    #[serde(rename = "mealType")]
    pub meal_type: Option<String>,
    /// Requested diets
    #[serde(rename = "dietTypes", default)]
    pub diet_types: Vec<String>,
    /// Available equipment
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Ingredients the dish must use
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Requested language, defaults to French
    pub language: Option<String>,
}

/// Successful admission outcome handed back to the route layer
pub struct AdmissionOutcome {
    /// Hydrated recipe
    pub recipe: Recipe,
    /// Authenticated owner
    pub user_id: Uuid,
    /// The recipe already existed (owner duplicate or clone)
    pub already_exists: bool,
    /// The recipe was cloned from another owner's analysis
    pub duplicated: bool,
    /// The recipe came from the generation flow
    pub generated: bool,
    /// User-scope rate headers
    pub rate_info: RateLimitInfo,
}

/// Sequences every gate and collaborator for the two admission flows
pub struct AdmissionController {
    authenticator: Authenticator,
    rate_gate: Arc<RateGate>,
    cost_gate: CostGate,
    single_flight: Arc<SingleFlightRegistry>,
    quota: QuotaLedger,
    pipeline: Arc<dyn VideoPipeline>,
    persister: RecipePersister,
}

impl AdmissionController {
    /// Assemble the controller from its collaborators
    #[must_use]
    pub fn new(
        authenticator: Authenticator,
        rate_gate: Arc<RateGate>,
        cost_gate: CostGate,
        single_flight: Arc<SingleFlightRegistry>,
        quota: QuotaLedger,
        pipeline: Arc<dyn VideoPipeline>,
        persister: RecipePersister,
    ) -> Self {
        Self {
            authenticator,
            rate_gate,
            cost_gate,
            single_flight,
            quota,
            pipeline,
            persister,
        }
    }

    /// Run the full analysis admission sequence.
    ///
    /// # Errors
    ///
    /// Any gate denial, validation failure, or pipeline/persistence failure,
    /// already mapped to its wire code.
    pub async fn analyze(
        &self,
        headers: &HeaderMap,
        ip: &str,
        body: AnalyzeBody,
    ) -> AppResult<AdmissionOutcome> {
        // 1-3: identity, rate windows, cost counters
        let user = self.authenticator.authenticate(headers)?;
        let rate_info = self
            .rate_gate
            .check(&RateProfile::standard(), user.id, ip)
            .await?;
        self.cost_gate.admit(user.id).await?;

        let result = self.analyze_admitted(&user, rate_info, body).await;
        log_outcome("analyze", user.id, &result);
        result
    }

    async fn analyze_admitted(
        &self,
        user: &AuthenticatedUser,
        rate_info: RateLimitInfo,
        body: AnalyzeBody,
    ) -> AppResult<AdmissionOutcome> {
        // 4: input validation
        let url = body
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::invalid_input("URL_MISSING", "url is required"))?;
        let parsed = url::Url::parse(url)
            .map_err(|_| AppError::invalid_input("URL_MISSING", "url must be a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::invalid_input(
                "URL_MISSING",
                "url must use http or https",
            ));
        }
        let language = parse_language(body.language.as_deref())?;
        let normalized = normalize_source_url(url).to_owned();

        // 5: owner duplicate - respond without touching the quota
        if let Some(existing) = self
            .persister
            .find_owner_duplicate(user.id, &normalized)
            .await?
        {
            let recipe = self.persister.hydrate(existing).await?;
            return Ok(AdmissionOutcome {
                recipe,
                user_id: user.id,
                already_exists: true,
                duplicated: false,
                generated: false,
                rate_info,
            });
        }

        // 6: single-flight; the guard releases on every path below
        let guard = self.single_flight.try_acquire(user.id, &normalized)?;

        // 7: global duplicate - billable clone
        if let Some(existing) = self.persister.find_global_duplicate(&normalized).await? {
            let status = self.quota.can_generate(user.id).await?;
            if !status.allowed {
                return Err(premium_required(language));
            }
            let mode = generation_mode(status.is_premium);
            let recipe = self
                .persister
                .clone_for_owner(existing, user.id, mode)
                .await?;
            if !status.is_premium {
                self.quota.debit(user.id).await;
            }
            guard.release();
            return Ok(AdmissionOutcome {
                recipe,
                user_id: user.id,
                already_exists: true,
                duplicated: true,
                generated: false,
                rate_info,
            });
        }

        // 8: quota
        let status = self.quota.can_generate(user.id).await?;
        if !status.allowed {
            return Err(premium_required(language));
        }

        // 9: pipeline (temp audio cleanup happens inside, before the lock drops)
        let output = self.pipeline.analyze(url, language).await?;

        // 10: persistence; thumbnail failures demote to a null image inside
        let image = output
            .metadata
            .as_ref()
            .and_then(|m| m.thumbnail_url.clone())
            .map_or(ImageSource::None, ImageSource::Remote);
        let recipe = self
            .persister
            .persist(
                user.id,
                generation_mode(status.is_premium),
                output.platform,
                Some(url.to_owned()),
                output.draft,
                image,
            )
            .await?;

        // 11-12: debit exactly once on new billable work, then release
        if !status.is_premium {
            self.quota.debit(user.id).await;
        }
        guard.release();

        Ok(AdmissionOutcome {
            recipe,
            user_id: user.id,
            already_exists: false,
            duplicated: false,
            generated: false,
            rate_info,
        })
    }

    /// Run the generation admission sequence (no duplicate lookups).
    ///
    /// # Errors
    ///
    /// Any gate denial, validation failure, or pipeline/persistence failure,
    /// already mapped to its wire code.
    pub async fn generate(
        &self,
        headers: &HeaderMap,
        ip: &str,
        body: GenerateBody,
    ) -> AppResult<AdmissionOutcome> {
        let user = self.authenticator.authenticate(headers)?;
        let rate_info = self
            .rate_gate
            .check(&RateProfile::strict(), user.id, ip)
            .await?;
        self.cost_gate.admit(user.id).await?;

        let result = self.generate_admitted(&user, rate_info, body).await;
        log_outcome("generate", user.id, &result);
        result
    }

    async fn generate_admitted(
        &self,
        user: &AuthenticatedUser,
        rate_info: RateLimitInfo,
        body: GenerateBody,
    ) -> AppResult<AdmissionOutcome> {
        let language = parse_language(body.language.as_deref())?;
        let preferences = validate_preferences(&body, language)?;

        let guard = self.single_flight.try_acquire(user.id, GENERATED_LOCK_KEY)?;

        let status = self.quota.can_generate(user.id).await?;
        if !status.allowed {
            return Err(premium_required(language));
        }

        let output = self.pipeline.generate(&preferences, language).await?;
        let image = output.image.map_or(ImageSource::None, ImageSource::Inline);
        let recipe = self
            .persister
            .persist(
                user.id,
                generation_mode(status.is_premium),
                Platform::Generated,
                None,
                output.draft,
                image,
            )
            .await?;

        if !status.is_premium {
            self.quota.debit(user.id).await;
        }
        guard.release();

        Ok(AdmissionOutcome {
            recipe,
            user_id: user.id,
            already_exists: false,
            duplicated: false,
            generated: true,
            rate_info,
        })
    }

    /// Admin snapshot of both gates
    pub async fn gate_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "rate_gate": self.rate_gate.snapshot(),
            "cost_gate": self.cost_gate.snapshot().await,
            "analyses_in_flight": self.single_flight.held_count(),
        })
    }
}

const fn generation_mode(is_premium: bool) -> GenerationMode {
    if is_premium {
        GenerationMode::Premium
    } else {
        GenerationMode::Free
    }
}

fn parse_language(raw: Option<&str>) -> AppResult<Language> {
    raw.map_or(Ok(Language::default()), Language::parse)
}

fn premium_required(language: Language) -> AppError {
    let message = match language {
        Language::Fr => "Vous avez utilisé toutes vos générations gratuites. Passez premium pour continuer.",
        Language::En => "You have used all your free generations. Upgrade to premium to continue.",
    };
    AppError::PremiumRequired(message.to_owned())
}

/// Validate generation preferences against the closed sets for the requested
/// language.
fn validate_preferences(body: &GenerateBody, language: Language) -> AppResult<GenerationPreferences> {
    let meal_type = match body.meal_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => {
            if !vocab::contains(vocab::meal_types(language), value) {
                return Err(AppError::invalid_input(
                    "INVALID_MEAL_TYPE",
                    format!("unknown meal type '{value}'"),
                ));
            }
            Some(value.to_lowercase())
        }
    };

    if body.diet_types.len() > MAX_LIST_ITEMS {
        return Err(AppError::invalid_input(
            "INVALID_DIET_TYPES",
            "too many diet types",
        ));
    }
    for value in &body.diet_types {
        if !vocab::contains(vocab::diet_types(language), value) {
            return Err(AppError::invalid_input(
                "INVALID_DIET_TYPES",
                format!("unknown diet type '{value}'"),
            ));
        }
    }

    if body.equipment.len() > MAX_LIST_ITEMS {
        return Err(AppError::invalid_input(
            "INVALID_EQUIPMENT",
            "too many equipment entries",
        ));
    }
    for value in &body.equipment {
        if !vocab::contains(vocab::equipment(language), value) {
            return Err(AppError::invalid_input(
                "INVALID_EQUIPMENT",
                format!("unknown equipment '{value}'"),
            ));
        }
    }

    if body.ingredients.len() > MAX_LIST_ITEMS {
        return Err(AppError::invalid_input(
            "INVALID_INGREDIENTS",
            "too many ingredients",
        ));
    }
    for value in &body.ingredients {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.len() > 100 {
            return Err(AppError::invalid_input(
                "INVALID_INGREDIENTS",
                "ingredients must be non-empty strings under 100 characters",
            ));
        }
    }

    Ok(GenerationPreferences {
        meal_type,
        diet_types: body.diet_types.iter().map(|v| v.trim().to_lowercase()).collect(),
        equipment: body.equipment.iter().map(|v| v.trim().to_lowercase()).collect(),
        ingredients: body.ingredients.iter().map(|v| v.trim().to_owned()).collect(),
    })
}

/// Cleanup action 3: the structured outcome log, emitted after temp-file
/// cleanup and lock release.
fn log_outcome(endpoint: &str, user_id: Uuid, result: &AppResult<AdmissionOutcome>) {
    match result {
        Ok(outcome) => info!(
            endpoint,
            %user_id,
            recipe_id = %outcome.recipe.id,
            already_exists = outcome.already_exists,
            duplicated = outcome.duplicated,
            generated = outcome.generated,
            outcome = "OK",
            "request settled"
        ),
        Err(error) => info!(
            endpoint,
            %user_id,
            outcome = error.code(),
            "request settled"
        ),
    }
}
