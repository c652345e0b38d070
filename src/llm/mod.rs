// ABOUTME: LLM provider abstraction for recipe extraction, generation, and dish images
// ABOUTME: Owns the JSON response contract including code-fence stripping and NOT_RECIPE
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! LLM provider abstraction.
//!
//! Text providers answer extraction and generation prompts; image providers
//! produce one square dish image. The model is constrained to return either a
//! JSON object with `error: "NOT_RECIPE"` and a localized message, or a recipe
//! object whose keys are English but whose textual values are in the caller's
//! requested language. Responses wrapped in code fences are unwrapped before
//! parsing.

pub mod gemini;
pub mod openai;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{AiVendor, ServerConfig};
use crate::errors::{AppError, AppResult};

/// Sampling temperature for extraction from a transcript
pub const EXTRACTION_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for generation from preferences
pub const GENERATION_TEMPERATURE: f32 = 0.7;

/// One completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System instruction, when the provider supports one
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
}

/// One completion response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Raw model output
    pub content: String,
    /// Model that produced it
    pub model: String,
}

/// Text completion provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or provider failure; there is no in-core
    /// retry.
    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse>;
}

/// Image produced by an image provider
#[derive(Debug, Clone)]
pub enum ImagePayload {
    /// Remote URL to download
    Url(String),
    /// Inline bytes (decoded from a base64 data response)
    Bytes {
        /// Raw image bytes
        data: Vec<u8>,
        /// MIME type, e.g. `image/png`
        mime: String,
    },
}

/// Dish image provider (one square 1024x1024 image per call)
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Generate one image for the prompt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport or provider failure.
    async fn generate(&self, prompt: &str) -> AppResult<ImagePayload>;
}

/// Build the configured text provider.
///
/// # Errors
///
/// Returns `AppError::Config` when the matching API key is missing.
pub fn text_provider_from_config(config: &ServerConfig) -> AppResult<Arc<dyn LlmProvider>> {
    match config.ai_provider {
        AiVendor::OpenAi => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| AppError::config("OPENAI_API_KEY is not set"))?;
            Ok(Arc::new(openai::OpenAiProvider::new(
                key,
                config.ai_model.clone(),
            )))
        }
        AiVendor::Gemini => {
            let key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| AppError::config("GEMINI_API_KEY is not set"))?;
            Ok(Arc::new(gemini::GeminiProvider::new(
                key,
                config.ai_model.clone(),
            )))
        }
    }
}

/// Build the configured image provider.
///
/// # Errors
///
/// Returns `AppError::Config` when the matching API key is missing.
pub fn image_provider_from_config(config: &ServerConfig) -> AppResult<Arc<dyn ImageProvider>> {
    match config.image_provider {
        AiVendor::OpenAi => {
            let key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| AppError::config("OPENAI_API_KEY is not set"))?;
            Ok(Arc::new(openai::OpenAiImageProvider::new(
                key,
                config.image_model.clone(),
            )))
        }
        AiVendor::Gemini => {
            let key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| AppError::config("GEMINI_API_KEY is not set"))?;
            Ok(Arc::new(gemini::GeminiImageProvider::new(
                key,
                config.image_model.clone(),
            )))
        }
    }
}

/// Recipe object as the model returns it, before normalization
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRecipe {
    /// Recipe title in the requested language
    pub title: String,
    /// Preparation time in minutes
    pub prep_time: Option<i64>,
    /// Cooking time in minutes
    pub cook_time: Option<i64>,
    /// Total time in minutes
    pub total_time: Option<i64>,
    /// Number of servings
    pub servings: Option<i64>,
    /// Cuisine origin from the closed set, or anything the model produced
    pub cuisine_origin: Option<String>,
    /// Meal type from the closed set, or anything the model produced
    pub meal_type: Option<String>,
    /// Diet types; the model sometimes answers a single string, so this stays
    /// raw until normalization coerces it to a list
    #[serde(default)]
    pub diet_type: Value,
    /// Kilocalories per serving
    pub calories: Option<f64>,
    /// Protein grams per serving
    pub proteins: Option<f64>,
    /// Carbohydrate grams per serving
    pub carbs: Option<f64>,
    /// Fat grams per serving
    pub fats: Option<f64>,
    /// Equipment, restricted to the closed vocabulary during normalization
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Extracted ingredients
    #[serde(default)]
    pub ingredients: Vec<ExtractedIngredient>,
    /// Extracted steps
    #[serde(default)]
    pub steps: Vec<ExtractedStep>,
}

/// One extracted ingredient
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedIngredient {
    /// Ingredient name
    pub name: String,
    /// Amount in `unit`
    pub quantity: Option<f64>,
    /// Free-form unit
    pub unit: Option<String>,
}

/// One extracted step
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedStep {
    /// 1-based position; renumbered densely during normalization
    pub order: Option<i64>,
    /// Instruction text
    pub text: String,
    /// Duration in minutes
    pub duration: Option<i64>,
    /// Temperature in °C
    pub temperature: Option<i64>,
    /// Ingredient names used in this step
    #[serde(default)]
    pub ingredients_used: Vec<String>,
}

/// Strip a surrounding markdown code fence, if any
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner
        .strip_suffix("```")
        .map_or(inner, str::trim)
        .trim()
}

/// Parse a model response into an [`ExtractedRecipe`], translating the
/// `NOT_RECIPE` verdict into its domain error.
///
/// # Errors
///
/// `NOT_RECIPE` with the model's localized message when the content is
/// non-culinary; a provider error when the response is not valid JSON or does
/// not match the recipe contract.
pub fn parse_recipe_response(raw: &str) -> AppResult<ExtractedRecipe> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AppError::external_service("llm", format!("response is not JSON: {e}")))?;

    if value.get("error").and_then(Value::as_str) == Some("NOT_RECIPE") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("This content does not contain a recipe.")
            .to_owned();
        return Err(AppError::NotRecipe(message));
    }

    serde_json::from_value(value).map_err(|e| {
        AppError::external_service("llm", format!("response does not match recipe shape: {e}"))
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn not_recipe_verdict_becomes_the_domain_error() {
        let raw = r#"{"error": "NOT_RECIPE", "message": "Ce lien ne contient pas de recette de cuisine."}"#;
        match parse_recipe_response(raw) {
            Err(AppError::NotRecipe(message)) => {
                assert_eq!(message, "Ce lien ne contient pas de recette de cuisine.");
            }
            other => panic!("expected NOT_RECIPE, got {other:?}"),
        }
    }

    #[test]
    fn recipe_object_parses_with_partial_fields() {
        let raw = r#"```json
        {
          "title": "Tarte aux pommes",
          "servings": 6,
          "diet_type": "végétarien",
          "ingredients": [{"name": "pommes", "quantity": 4, "unit": null}],
          "steps": [{"order": 1, "text": "Préchauffer le four.", "temperature": 180}]
        }
        ```"#;
        let recipe = parse_recipe_response(raw).unwrap();
        assert_eq!(recipe.title, "Tarte aux pommes");
        assert_eq!(recipe.servings, Some(6));
        assert_eq!(recipe.diet_type, Value::String("végétarien".to_owned()));
        assert_eq!(recipe.steps[0].temperature, Some(180));
        assert!(recipe.prep_time.is_none());
    }

    #[test]
    fn malformed_json_is_a_provider_error() {
        let err = parse_recipe_response("the model rambled instead").unwrap_err();
        assert!(matches!(err, AppError::ExternalService { .. }));
    }
}
