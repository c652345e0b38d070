// ABOUTME: Common data models for recipes, platforms, and request-scoped identities
// ABOUTME: Owns URL normalization, the canonical key for single-flight and idempotence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Domain types shared across the admission layer, pipeline, and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Truncate a source URL at the first `?`.
///
/// The normalized form is the canonical key for both single-flight and
/// idempotence: `normalize_source_url(u) == normalize_source_url(u + "?x=y")`.
#[must_use]
pub fn normalize_source_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Request language; recipe text values come back in this language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    /// French
    #[serde(rename = "fr")]
    Fr,
    /// English
    #[serde(rename = "en")]
    En,
}

impl Language {
    /// Lowercase language tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
        }
    }

    /// Parse a request-supplied language tag
    ///
    /// # Errors
    ///
    /// Returns `INVALID_LANGUAGE` for anything but `fr` or `en`.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "fr" => Ok(Self::Fr),
            "en" => Ok(Self::En),
            other => Err(AppError::invalid_input(
                "INVALID_LANGUAGE",
                format!("unsupported language '{other}' (expected 'fr' or 'en')"),
            )),
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::Fr
    }
}

/// Video platform, determined by URL pattern; `Generated` is assigned, not matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// tiktok.com video URLs
    #[serde(rename = "tiktok")]
    TikTok,
    /// youtube.com / youtu.be URLs
    #[serde(rename = "youtube")]
    YouTube,
    /// instagram.com reel/post URLs
    #[serde(rename = "instagram")]
    Instagram,
    /// Recipe generated from preferences, no source video
    #[serde(rename = "generated")]
    Generated,
}

impl Platform {
    /// Lowercase name, also the object-store folder for this platform
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::Instagram => "instagram",
            Self::Generated => "generated",
        }
    }

    /// Parse a stored platform string; unknown values map to `Generated`
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match value {
            "tiktok" => Self::TikTok,
            "youtube" => Self::YouTube,
            "instagram" => Self::Instagram,
            _ => Self::Generated,
        }
    }
}

/// Source-dependent video metadata (oEmbed or Open-Graph)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video title or caption
    pub title: Option<String>,
    /// Channel / account display name
    pub author: Option<String>,
    /// Channel / account URL
    pub author_url: Option<String>,
    /// Remote thumbnail URL (not retained after upload)
    pub thumbnail_url: Option<String>,
}

/// Whether the work was billed against the free quota or covered by premium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Debited one free generation
    #[serde(rename = "free")]
    Free,
    /// Premium subscription, no debit
    #[serde(rename = "premium")]
    Premium,
}

impl GenerationMode {
    /// Stored string form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// Parse a stored mode string; unknown values map to `Free`
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match value {
            "premium" => Self::Premium,
            _ => Self::Free,
        }
    }
}

/// A persisted ingredient row, child of a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name as extracted
    pub name: String,
    /// Amount in `unit`, when the extraction produced one
    pub quantity: Option<f64>,
    /// Free-form unit string ("g", "cuillère à soupe", ...)
    pub unit: Option<String>,
    /// Master food table reference, set by the fuzzy matcher
    pub food_item_id: Option<String>,
}

/// A persisted preparation step, child of a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Dense 1-based position
    pub order: i64,
    /// Instruction text
    pub text: String,
    /// Duration in minutes, when stated
    pub duration: Option<i64>,
    /// Temperature in °C, when stated
    pub temperature: Option<i64>,
    /// Names of ingredients from the same recipe used in this step
    #[serde(default)]
    pub ingredients_used: Vec<String>,
}

/// A fully hydrated recipe: row plus ordered children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Generated identity
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Insertion time
    pub created_at: DateTime<Utc>,
    /// Recipe title (required)
    pub title: String,
    /// Original video URL; null for generated recipes
    pub source_url: Option<String>,
    /// Source platform
    pub platform: Platform,
    /// Preparation time in minutes
    pub prep_time: Option<i64>,
    /// Cooking time in minutes
    pub cook_time: Option<i64>,
    /// Total time in minutes
    pub total_time: Option<i64>,
    /// Number of servings
    pub servings: Option<i64>,
    /// Single value from the per-language cuisine set
    pub cuisine_origin: Option<String>,
    /// Single value from the per-language meal-type set
    pub meal_type: Option<String>,
    /// Zero or more values from the per-language diet set
    #[serde(default)]
    pub diet_type: Vec<String>,
    /// Kilocalories per serving
    pub calories: Option<f64>,
    /// Protein grams per serving
    pub proteins: Option<f64>,
    /// Carbohydrate grams per serving
    pub carbs: Option<f64>,
    /// Fat grams per serving
    pub fats: Option<f64>,
    /// Ordered equipment list from the per-language closed set
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Public object-store URL of the dish image
    pub image_url: Option<String>,
    /// Billing mode recorded at creation
    pub generation_mode: GenerationMode,
    /// Ingredients, ordered by name on hydration
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    /// Steps, ordered by `order` on hydration
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Validated preferences driving the generation flow (no source video)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationPreferences {
    /// Requested meal type, from the per-language closed set
    pub meal_type: Option<String>,
    /// Requested diets, from the per-language closed set
    #[serde(default)]
    pub diet_types: Vec<String>,
    /// Available equipment, from the per-language closed set
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Free-form ingredients the dish must use
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// Master food table entry (external, read-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    /// Stable identifier
    pub id: String,
    /// Canonical name, unique by normalized form
    pub name: String,
}

/// Premium status and remaining quota for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Identity-provider user id
    pub user_id: Uuid,
    /// Premium subscribers are never debited
    pub is_premium: bool,
    /// Remaining free generations, never negative
    pub free_generations_remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_query_string() {
        let base = "https://www.tiktok.com/@chef/video/123";
        assert_eq!(normalize_source_url(base), base);
        assert_eq!(
            normalize_source_url("https://www.tiktok.com/@chef/video/123?is_copy=1&lang=fr"),
            base
        );
        // Equivalence under arbitrary query suffixes
        let suffixed = format!("{base}?{}", "anything=goes&x=%20y");
        assert_eq!(normalize_source_url(&suffixed), normalize_source_url(base));
    }

    #[test]
    fn platform_round_trips_through_storage() {
        for platform in [
            Platform::TikTok,
            Platform::YouTube,
            Platform::Instagram,
            Platform::Generated,
        ] {
            assert_eq!(Platform::from_stored(platform.as_str()), platform);
        }
        assert_eq!(Platform::from_stored("vimeo"), Platform::Generated);
    }

    #[test]
    fn language_rejects_unknown_tags() {
        assert!(Language::parse("de").is_err());
        assert_eq!(Language::parse("fr").ok(), Some(Language::Fr));
    }
}
