// ABOUTME: Prompt construction for recipe extraction, generation, and dish images
// ABOUTME: Embeds the per-language closed vocabularies so the model cannot invent values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Prompt builders.
//!
//! Every prompt pins the response contract: a single JSON object, English
//! keys, textual values in the requested language, and the `NOT_RECIPE` escape
//! hatch with a localized message.

use crate::models::{GenerationPreferences, Language};
use crate::vocab;

/// System instruction shared by extraction and generation
#[must_use]
pub fn system_prompt(language: Language) -> String {
    let language_name = match language {
        Language::Fr => "French",
        Language::En => "English",
    };
    format!(
        "You are a culinary assistant that outputs strictly valid JSON. \
         Object keys are always English; every textual value is written in {language_name}. \
         Never wrap the JSON in markdown fences and never add commentary."
    )
}

/// Shared schema section enumerating the closed sets
fn schema_section(language: Language) -> String {
    format!(
        "Return one JSON object with these keys:\n\
         - title (string, required)\n\
         - prep_time, cook_time, total_time (integer minutes or null)\n\
         - servings (integer or null)\n\
         - cuisine_origin: exactly one of [{cuisines}] or null\n\
         - meal_type: exactly one of [{meals}] or null\n\
         - diet_type: array with values from [{diets}] (empty array if none apply)\n\
         - calories, proteins, carbs, fats (numbers per serving, or null)\n\
         - equipment: array with values from [{equipment}], in order of use\n\
         - ingredients: array of {{name, quantity (number or null), unit (string or null)}}\n\
         - steps: array of {{order (1-based integer), text, duration (minutes or null), \
           temperature (celsius or null), ingredients_used (array of ingredient names)}}",
        cuisines = vocab::cuisine_origins(language).join(", "),
        meals = vocab::meal_types(language).join(", "),
        diets = vocab::diet_types(language).join(", "),
        equipment = vocab::equipment(language).join(", "),
    )
}

fn not_recipe_clause(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "If the content is not about cooking a dish, respond instead with \
             {\"error\": \"NOT_RECIPE\", \"message\": \"Ce lien ne contient pas de recette de cuisine.\"}."
        }
        Language::En => {
            "If the content is not about cooking a dish, respond instead with \
             {\"error\": \"NOT_RECIPE\", \"message\": \"This link does not contain a cooking recipe.\"}."
        }
    }
}

/// Prompt for extracting a structured recipe from a transcript
#[must_use]
pub fn extraction_prompt(
    transcript: &str,
    description: Option<&str>,
    language: Language,
) -> String {
    let description_section = description
        .filter(|text| !text.is_empty())
        .map(|text| format!("Video description: {text}\n\n"))
        .unwrap_or_default();
    format!(
        "Extract the recipe prepared in this cooking video.\n\n\
         {description_section}Transcript:\n{transcript}\n\n\
         {schema}\n\n{not_recipe}",
        schema = schema_section(language),
        not_recipe = not_recipe_clause(language),
    )
}

/// Prompt for generating a real recipe from validated user preferences
#[must_use]
pub fn generation_prompt(preferences: &GenerationPreferences, language: Language) -> String {
    let mut constraints = Vec::new();
    if let Some(meal_type) = &preferences.meal_type {
        constraints.push(format!("meal type: {meal_type}"));
    }
    if !preferences.diet_types.is_empty() {
        constraints.push(format!("diets: {}", preferences.diet_types.join(", ")));
    }
    if !preferences.equipment.is_empty() {
        constraints.push(format!(
            "available equipment: {}",
            preferences.equipment.join(", ")
        ));
    }
    if !preferences.ingredients.is_empty() {
        constraints.push(format!(
            "must use these ingredients: {}",
            preferences.ingredients.join(", ")
        ));
    }
    let constraints = if constraints.is_empty() {
        "no particular constraints".to_owned()
    } else {
        constraints.join("; ")
    };

    format!(
        "Propose one real, existing dish matching these preferences: {constraints}.\n\
         Pick a traditional or well-established recipe - do not invent a novel dish, \
         do not combine preferences into something nobody cooks. If an ingredient \
         conflicts with the requested diet, leave it out.\n\n{schema}\n\n{not_recipe}",
        schema = schema_section(language),
        not_recipe = not_recipe_clause(language),
    )
}

/// Prompt for the dish image model
#[must_use]
pub fn image_prompt(title: &str) -> String {
    format!(
        "Professional food photography of {title}, plated on a neutral table, \
         natural lighting, shallow depth of field, no text, no people."
    )
}
