// ABOUTME: Pipeline orchestrator sequencing platform, speech-to-text, and LLM extraction
// ABOUTME: Owns temp audio files via a drop guard so cleanup runs on every path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Pipeline orchestration.
//!
//! Fixed sequence for analysis: detect platform, fetch metadata, extract
//! audio, transcribe, extract a structured recipe, normalize. The audio file
//! lives inside a guard that deletes it on success, failure, and caller
//! disconnection alike. The generation flow skips the video half and adds a
//! dish image.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::errors::AppResult;
use crate::llm::{
    self, prompts, ChatRequest, ExtractedIngredient, ExtractedRecipe, ImagePayload, ImageProvider,
    LlmProvider, EXTRACTION_TEMPERATURE, GENERATION_TEMPERATURE,
};
use crate::models::{GenerationPreferences, Language, Platform, Step, VideoMetadata};
use crate::platforms::{cleanup_file, PlatformRegistry};
use crate::transcription::Transcriber;
use crate::vocab;

/// Normalized recipe content ready for persistence
#[derive(Debug, Clone)]
pub struct DraftRecipe {
    /// Title in the requested language
    pub title: String,
    /// Preparation time in minutes
    pub prep_time: Option<i64>,
    /// Cooking time in minutes
    pub cook_time: Option<i64>,
    /// Total time in minutes
    pub total_time: Option<i64>,
    /// Number of servings
    pub servings: Option<i64>,
    /// Cuisine origin, null when the model produced none
    pub cuisine_origin: Option<String>,
    /// Meal type, null when the model produced none
    pub meal_type: Option<String>,
    /// Diet types coerced to a (possibly empty) list
    pub diet_type: Vec<String>,
    /// Kilocalories per serving
    pub calories: Option<f64>,
    /// Protein grams per serving
    pub proteins: Option<f64>,
    /// Carbohydrate grams per serving
    pub carbs: Option<f64>,
    /// Fat grams per serving
    pub fats: Option<f64>,
    /// Equipment restricted to the per-language closed vocabulary
    pub equipment: Vec<String>,
    /// Extracted ingredients (fuzzy food linking happens at persistence)
    pub ingredients: Vec<ExtractedIngredient>,
    /// Steps with dense 1-based order
    pub steps: Vec<Step>,
}

/// Result of the analysis flow
pub struct AnalysisOutput {
    /// Normalized recipe content
    pub draft: DraftRecipe,
    /// Detected platform
    pub platform: Platform,
    /// Metadata fetched from the platform, when available
    pub metadata: Option<VideoMetadata>,
}

/// Result of the generation flow
pub struct GenerationOutput {
    /// Normalized recipe content
    pub draft: DraftRecipe,
    /// Generated dish image, when the image provider succeeded
    pub image: Option<ImagePayload>,
}

/// Pipeline seam used by the admission controller
#[async_trait]
pub trait VideoPipeline: Send + Sync {
    /// Analyze a video URL into a normalized recipe draft.
    ///
    /// # Errors
    ///
    /// `PLATFORM_UNSUPPORTED` before any provider call, `NOT_RECIPE` on the
    /// model's verdict, provider errors otherwise.
    async fn analyze(&self, url: &str, language: Language) -> AppResult<AnalysisOutput>;

    /// Generate a recipe draft (plus dish image) from validated preferences.
    ///
    /// # Errors
    ///
    /// `NOT_RECIPE` on the model's verdict, provider errors otherwise.
    async fn generate(
        &self,
        preferences: &GenerationPreferences,
        language: Language,
    ) -> AppResult<GenerationOutput>;
}

/// Deletes the extracted audio file on drop, covering success, failure, and
/// cancellation paths with the same discipline
struct TempAudio {
    path: PathBuf,
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        cleanup_file(&self.path);
    }
}

/// Production pipeline over the real collaborators
pub struct RecipePipeline {
    registry: PlatformRegistry,
    transcriber: Arc<dyn Transcriber>,
    llm: Arc<dyn LlmProvider>,
    image: Arc<dyn ImageProvider>,
    temp_dir: PathBuf,
}

impl RecipePipeline {
    /// Assemble the pipeline from its collaborators
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        transcriber: Arc<dyn Transcriber>,
        llm: Arc<dyn LlmProvider>,
        image: Arc<dyn ImageProvider>,
    ) -> Self {
        Self {
            registry: PlatformRegistry::new(config),
            transcriber,
            llm,
            image,
            temp_dir: config.temp_dir.clone(),
        }
    }

}

#[async_trait]
impl VideoPipeline for RecipePipeline {
    async fn analyze(&self, url: &str, language: Language) -> AppResult<AnalysisOutput> {
        let handler = self.registry.detect(url)?;
        let platform = handler.platform();

        let metadata = handler.fetch_metadata(url).await;
        debug!(platform = handler.name(), has_metadata = metadata.is_some(), "starting analysis");

        let audio = TempAudio {
            path: handler.extract_audio(url, &self.temp_dir).await?,
        };
        let transcript = self.transcriber.transcribe(&audio.path, language).await?;
        // The audio file is no longer needed once transcribed
        drop(audio);

        let description = metadata
            .as_ref()
            .and_then(|m| m.title.as_deref())
            .map(|title| handler.clean_description(title));

        let request = ChatRequest {
            system: Some(prompts::system_prompt(language)),
            prompt: prompts::extraction_prompt(&transcript, description.as_deref(), language),
            temperature: EXTRACTION_TEMPERATURE,
        };
        let response = self.llm.complete(&request).await?;
        let extracted = llm::parse_recipe_response(&response.content)?;
        info!(title = %extracted.title, model = %response.model, "recipe extracted");

        Ok(AnalysisOutput {
            draft: normalize(extracted, language),
            platform,
            metadata,
        })
    }

    async fn generate(
        &self,
        preferences: &GenerationPreferences,
        language: Language,
    ) -> AppResult<GenerationOutput> {
        let request = ChatRequest {
            system: Some(prompts::system_prompt(language)),
            prompt: prompts::generation_prompt(preferences, language),
            temperature: GENERATION_TEMPERATURE,
        };
        let response = self.llm.complete(&request).await?;
        let extracted = llm::parse_recipe_response(&response.content)?;
        let draft = normalize(extracted, language);
        info!(title = %draft.title, model = %response.model, "recipe generated");

        let image = match self.image.generate(&prompts::image_prompt(&draft.title)).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("dish image generation failed, continuing without: {e}");
                None
            }
        };

        Ok(GenerationOutput { draft, image })
    }
}

/// Normalize a raw extraction: coerce `diet_type` to a list, keep classifiers
/// nullable, restrict equipment to the closed vocabulary, and renumber steps
/// densely from 1.
#[must_use]
pub fn normalize(extracted: ExtractedRecipe, language: Language) -> DraftRecipe {
    let diet_type = match extracted.diet_type {
        Value::String(single) if !single.trim().is_empty() => vec![single],
        Value::Array(values) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let steps = extracted
        .steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| Step {
            order: index as i64 + 1,
            text: step.text,
            duration: step.duration,
            temperature: step.temperature,
            ingredients_used: step.ingredients_used,
        })
        .collect();

    DraftRecipe {
        title: extracted.title,
        prep_time: extracted.prep_time,
        cook_time: extracted.cook_time,
        total_time: extracted.total_time,
        servings: extracted.servings,
        cuisine_origin: extracted.cuisine_origin.filter(|s| !s.trim().is_empty()),
        meal_type: extracted.meal_type.filter(|s| !s.trim().is_empty()),
        diet_type,
        calories: extracted.calories,
        proteins: extracted.proteins,
        carbs: extracted.carbs,
        fats: extracted.fats,
        equipment: vocab::restrict_equipment(&extracted.equipment, language),
        ingredients: extracted.ingredients,
        steps,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn extracted(diet_type: Value) -> ExtractedRecipe {
        let raw = serde_json::json!({
            "title": "Omelette",
            "diet_type": diet_type,
            "equipment": ["Plaque de cuisson", "wok"],
            "steps": [
                {"order": 4, "text": "Battre les œufs."},
                {"order": 9, "text": "Cuire."}
            ],
        });
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn diet_type_string_becomes_a_singleton_list() {
        let draft = normalize(extracted(Value::String("végétarien".to_owned())), Language::Fr);
        assert_eq!(draft.diet_type, vec!["végétarien".to_owned()]);
    }

    #[test]
    fn diet_type_null_becomes_an_empty_list() {
        let draft = normalize(extracted(Value::Null), Language::Fr);
        assert!(draft.diet_type.is_empty());
    }

    #[test]
    fn steps_are_renumbered_densely_from_one() {
        let draft = normalize(extracted(Value::Null), Language::Fr);
        let orders: Vec<i64> = draft.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn equipment_outside_the_vocabulary_is_dropped() {
        let draft = normalize(extracted(Value::Null), Language::Fr);
        assert_eq!(draft.equipment, vec!["plaque de cuisson".to_owned()]);
    }
}
