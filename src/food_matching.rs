// ABOUTME: Fuzzy ingredient-to-food-item linking with substring and word-overlap scoring
// ABOUTME: Deterministic matcher over a snapshot of the master food table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Fuzzy ingredient linking.
//!
//! Names are normalized (lowercase, NFD, combining marks stripped, whitespace
//! collapsed) before scoring. The score between two normalized names is 1.0
//! for an exact match, 0.8 when the shorter is a substring of the longer and
//! both have at least 3 characters, and otherwise a word-overlap ratio with a
//! 0.7 floor when every word of the shorter set is contained in the longer
//! set. Matches at or above 0.5 are accepted; ties break by first-seen order,
//! so the matcher is deterministic for a given table snapshot.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::FoodItem;

/// Acceptance threshold for the best score
const ACCEPT_THRESHOLD: f64 = 0.5;
/// Floor applied when every word of the shorter name appears in the longer one
const CONTAINMENT_FLOOR: f64 = 0.7;
/// Score for a substring relationship between sufficiently long names
const SUBSTRING_SCORE: f64 = 0.8;

/// Normalize a name for comparison: lowercase, Unicode NFD with combining
/// marks stripped, whitespace collapsed and trimmed.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let stripped: String = raw
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity between two already-normalized names, in `[0, 1]`
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.chars().count() >= 3 && longer.contains(shorter) {
        return SUBSTRING_SCORE;
    }

    let words_a: Vec<&str> = a.split(' ').collect();
    let words_b: Vec<&str> = b.split(' ').collect();
    let overlap = words_a.iter().filter(|w| words_b.contains(w)).count();
    let word_score = overlap as f64 / words_a.len().max(words_b.len()) as f64;

    let (short_set, long_set) = if words_a.len() <= words_b.len() {
        (&words_a, &words_b)
    } else {
        (&words_b, &words_a)
    };
    // Containment is exact word-set membership, the same basis as the
    // intersection above; inflected forms do not count.
    let contained = short_set.iter().all(|w| long_set.contains(w));
    if contained {
        word_score.max(CONTAINMENT_FLOOR)
    } else {
        word_score
    }
}

/// Matcher over a snapshot of the master food table
pub struct FoodMatcher {
    items: Vec<(String, FoodItem)>,
}

impl FoodMatcher {
    /// Build from the table snapshot, preserving first-seen order for the
    /// tie-break.
    #[must_use]
    pub fn new(items: Vec<FoodItem>) -> Self {
        let items = items
            .into_iter()
            .map(|item| (normalize_name(&item.name), item))
            .collect();
        Self { items }
    }

    /// Best match for a raw ingredient name, or `None` below the threshold
    #[must_use]
    pub fn best_match(&self, raw_name: &str) -> Option<&FoodItem> {
        let needle = normalize_name(raw_name);
        let mut best: Option<(&FoodItem, f64)> = None;
        for (normalized, item) in &self.items {
            let score = similarity(&needle, normalized);
            // Strict > keeps the first-seen item on ties
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((item, score));
            }
        }
        best.filter(|(_, score)| *score >= ACCEPT_THRESHOLD)
            .map(|(item, _)| item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> FoodItem {
        FoodItem {
            id: id.to_owned(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn normalization_strips_accents_and_collapses_whitespace() {
        assert_eq!(normalize_name("  Tomates   Fraîches "), "tomates fraiches");
        assert_eq!(normalize_name("Œuf"), normalize_name("œuf"));
        assert_eq!(normalize_name("CRÈME  fraîche"), "creme fraiche");
    }

    #[test]
    fn exact_match_scores_one() {
        assert!((similarity("tomate", "tomate") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn substring_scores_point_eight() {
        assert!((similarity("riz", "riz basmati") - 0.8).abs() < f64::EPSILON);
        // Too short for the substring rule
        assert!(similarity("ri", "riz basmati") < 0.8);
    }

    #[test]
    fn word_containment_floors_at_point_seven() {
        // Not a substring of the longer name, so this exercises the word path:
        // both words appear exactly, word score 2/3, floored to 0.7
        let score = similarity("creme fraiche", "fraiche creme epaisse");
        assert!((score - 0.7).abs() < f64::EPSILON, "containment floor not applied: {score}");
    }

    #[test]
    fn inflected_words_do_not_count_as_contained() {
        // "poulet"/"poulets" and "roti"/"rotis" are different words; the
        // overlap is empty and no containment floor applies
        let score = similarity("poulet roti", "blanc de poulets rotis");
        assert!(score < f64::EPSILON, "expected no match, got {score}");
    }

    #[test]
    fn disjoint_names_score_zero() {
        assert!(similarity("carotte", "saumon fume") < f64::EPSILON);
    }

    #[test]
    fn matcher_links_tomates_fraiches_to_tomate() {
        let matcher = FoodMatcher::new(vec![
            item("f1", "Carotte"),
            item("f2", "Tomate"),
            item("f3", "Pomme de terre"),
        ]);
        let matched = matcher.best_match("tomates fraîches");
        assert_eq!(matched.map(|m| m.id.as_str()), Some("f2"));
    }

    #[test]
    fn below_threshold_is_none() {
        let matcher = FoodMatcher::new(vec![item("f1", "Saumon")]);
        assert!(matcher.best_match("farine de blé").is_none());
    }

    #[test]
    fn ties_break_by_first_seen_order() {
        let matcher = FoodMatcher::new(vec![item("a", "Sucre roux"), item("b", "Sucre blanc")]);
        // "sucre" scores 0.8 against both; the first-seen row wins
        assert_eq!(matcher.best_match("sucre").map(|m| m.id.as_str()), Some("a"));
    }

    #[test]
    fn matcher_is_deterministic() {
        let matcher = FoodMatcher::new(vec![item("a", "Tomate"), item("b", "Oignon")]);
        let first = matcher.best_match("tomates").map(|m| m.id.clone());
        for _ in 0..10 {
            assert_eq!(matcher.best_match("tomates").map(|m| m.id.clone()), first);
        }
    }
}
