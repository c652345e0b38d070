// ABOUTME: Closed per-language vocabularies for cuisine, meal type, diet, and equipment
// ABOUTME: Provides ingress validation and the enumerations embedded in LLM prompts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Closed-set vocabularies.
//!
//! `cuisine_origin`, `meal_type`, `diet_type`, and `equipment` are fixed,
//! enumerated vocabularies, distinct per language. The ingress validator
//! checks user-supplied preferences against these sets before any provider is
//! contacted, and the extraction prompt enumerates them so the model cannot
//! invent values.

use crate::models::Language;

const CUISINE_ORIGINS_EN: &[&str] = &[
    "french", "italian", "spanish", "greek", "mexican", "american", "brazilian", "moroccan",
    "lebanese", "turkish", "indian", "thai", "vietnamese", "chinese", "japanese", "korean",
    "african", "caribbean", "fusion", "other",
];

const CUISINE_ORIGINS_FR: &[&str] = &[
    "française",
    "italienne",
    "espagnole",
    "grecque",
    "mexicaine",
    "américaine",
    "brésilienne",
    "marocaine",
    "libanaise",
    "turque",
    "indienne",
    "thaïlandaise",
    "vietnamienne",
    "chinoise",
    "japonaise",
    "coréenne",
    "africaine",
    "caribéenne",
    "fusion",
    "autre",
];

const MEAL_TYPES_EN: &[&str] = &["breakfast", "lunch", "dinner", "snack", "dessert", "drink"];

const MEAL_TYPES_FR: &[&str] = &[
    "petit-déjeuner",
    "déjeuner",
    "dîner",
    "collation",
    "dessert",
    "boisson",
];

const DIET_TYPES_EN: &[&str] = &[
    "vegetarian",
    "vegan",
    "gluten-free",
    "lactose-free",
    "pescatarian",
    "keto",
    "halal",
    "high-protein",
];

const DIET_TYPES_FR: &[&str] = &[
    "végétarien",
    "végétalien",
    "sans gluten",
    "sans lactose",
    "pescétarien",
    "keto",
    "halal",
    "riche en protéines",
];

const EQUIPMENT_EN: &[&str] = &[
    "oven",
    "stovetop",
    "microwave",
    "blender",
    "food processor",
    "air fryer",
    "pressure cooker",
    "slow cooker",
    "grill",
    "no cooking",
];

const EQUIPMENT_FR: &[&str] = &[
    "four",
    "plaque de cuisson",
    "micro-ondes",
    "mixeur",
    "robot de cuisine",
    "friteuse à air",
    "autocuiseur",
    "mijoteuse",
    "grill",
    "sans cuisson",
];

/// Allowed `cuisine_origin` values for a language
#[must_use]
pub const fn cuisine_origins(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => CUISINE_ORIGINS_EN,
        Language::Fr => CUISINE_ORIGINS_FR,
    }
}

/// Allowed `meal_type` values for a language
#[must_use]
pub const fn meal_types(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => MEAL_TYPES_EN,
        Language::Fr => MEAL_TYPES_FR,
    }
}

/// Allowed `diet_type` values for a language
#[must_use]
pub const fn diet_types(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => DIET_TYPES_EN,
        Language::Fr => DIET_TYPES_FR,
    }
}

/// Allowed `equipment` values for a language
#[must_use]
pub const fn equipment(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => EQUIPMENT_EN,
        Language::Fr => EQUIPMENT_FR,
    }
}

/// Case-insensitive membership test against a closed set
#[must_use]
pub fn contains(set: &[&str], value: &str) -> bool {
    let needle = value.trim().to_lowercase();
    set.iter().any(|entry| *entry == needle)
}

/// Keep only equipment entries that belong to the language's closed set,
/// preserving order and canonical casing
#[must_use]
pub fn restrict_equipment(values: &[String], language: Language) -> Vec<String> {
    let allowed = equipment(language);
    values
        .iter()
        .filter_map(|value| {
            let needle = value.trim().to_lowercase();
            allowed
                .iter()
                .find(|entry| **entry == needle)
                .map(|entry| (*entry).to_owned())
        })
        .collect()
}
