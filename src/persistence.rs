// ABOUTME: Persistence layer uploading thumbnails and writing recipe row sets
// ABOUTME: Child-write failures are logged and tolerated; the recipe row wins
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Recipe persistence.
//!
//! Ordering and compensations: the image is resolved first (any failure
//! demotes to `image_url = null`), then the recipe row is inserted, then the
//! ingredient batch (with fuzzy food linking) and the step batch. Failures in
//! the child batches are logged but do not roll back the recipe.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::database::food_items::FoodItemStore;
use crate::database::recipes::RecipeStore;
use crate::errors::{AppError, AppResult};
use crate::food_matching::FoodMatcher;
use crate::llm::ImagePayload;
use crate::models::{GenerationMode, Ingredient, Platform, Recipe};
use crate::pipeline::DraftRecipe;
use crate::storage::{object_key, extension_for, ImageBytes, ObjectStorage};

/// Where the recipe's image comes from
pub enum ImageSource {
    /// Remote thumbnail URL from platform metadata
    Remote(String),
    /// Payload handed over by the image provider
    Inline(ImagePayload),
    /// No image available
    None,
}

/// Writes recipes with their children and resolves dish images
#[derive(Clone)]
pub struct RecipePersister {
    recipes: RecipeStore,
    food_items: FoodItemStore,
    storage: ObjectStorage,
}

impl RecipePersister {
    /// Assemble the persister from its stores
    #[must_use]
    pub const fn new(
        recipes: RecipeStore,
        food_items: FoodItemStore,
        storage: ObjectStorage,
    ) -> Self {
        Self {
            recipes,
            food_items,
            storage,
        }
    }

    /// Persist a draft as a new recipe for the user and return it hydrated.
    ///
    /// # Errors
    ///
    /// Returns an error when the recipe row insert fails; image and child-row
    /// failures are demoted to warnings.
    pub async fn persist(
        &self,
        user_id: Uuid,
        mode: GenerationMode,
        platform: Platform,
        source_url: Option<String>,
        draft: DraftRecipe,
        image: ImageSource,
    ) -> AppResult<Recipe> {
        let image_url = self.resolve_image(platform, image).await;
        let ingredients = self.link_ingredients(&draft).await;

        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            title: draft.title,
            source_url,
            platform,
            prep_time: draft.prep_time,
            cook_time: draft.cook_time,
            total_time: draft.total_time,
            servings: draft.servings,
            cuisine_origin: draft.cuisine_origin,
            meal_type: draft.meal_type,
            diet_type: draft.diet_type,
            calories: draft.calories,
            proteins: draft.proteins,
            carbs: draft.carbs,
            fats: draft.fats,
            equipment: draft.equipment,
            image_url,
            generation_mode: mode,
            ingredients,
            steps: draft.steps,
        };

        self.recipes.insert_recipe_row(&recipe).await?;
        if let Err(e) = self.recipes.insert_ingredients(recipe.id, &recipe.ingredients).await {
            warn!(recipe_id = %recipe.id, "ingredient batch failed, keeping recipe: {e}");
        }
        if let Err(e) = self.recipes.insert_steps(recipe.id, &recipe.steps).await {
            warn!(recipe_id = %recipe.id, "step batch failed, keeping recipe: {e}");
        }

        self.hydrate(recipe.id).await
    }

    /// Full read of a persisted recipe.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure or when the recipe does not exist.
    pub async fn hydrate(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        self.recipes
            .get_hydrated(recipe_id)
            .await?
            .ok_or_else(|| AppError::database(format!("recipe {recipe_id} not found")))
    }

    /// Clone a recipe with its children for a new owner and return the clone
    /// hydrated.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn clone_for_owner(
        &self,
        recipe_id: Uuid,
        new_owner: Uuid,
        mode: GenerationMode,
    ) -> AppResult<Recipe> {
        let clone_id = self.recipes.clone_for_owner(recipe_id, new_owner, mode).await?;
        self.hydrate(clone_id).await
    }

    /// Idempotence lookup: most recent recipe of this owner for the
    /// normalized URL.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn find_owner_duplicate(
        &self,
        user_id: Uuid,
        normalized_url: &str,
    ) -> AppResult<Option<Uuid>> {
        self.recipes
            .find_latest_for_owner(user_id, normalized_url)
            .await
    }

    /// Idempotence lookup: most recent recipe of any owner for the normalized
    /// URL.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn find_global_duplicate(&self, normalized_url: &str) -> AppResult<Option<Uuid>> {
        self.recipes.find_latest_global(normalized_url).await
    }

    /// Resolve the final public image URL; every failure path demotes to
    /// `None` with a warning.
    async fn resolve_image(&self, platform: Platform, image: ImageSource) -> Option<String> {
        let bytes = match image {
            ImageSource::None => return None,
            ImageSource::Remote(url) | ImageSource::Inline(ImagePayload::Url(url)) => {
                match self.storage.download_image(&url).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("thumbnail download failed, storing without image: {e}");
                        return None;
                    }
                }
            }
            ImageSource::Inline(ImagePayload::Bytes { data, mime }) => {
                let extension = extension_for(&mime);
                ImageBytes {
                    data,
                    mime,
                    extension,
                }
            }
        };

        let key = object_key(platform.as_str(), &bytes.extension);
        match self.storage.upload(&key, bytes).await {
            Ok(public_url) => Some(public_url),
            Err(e) => {
                warn!("thumbnail upload failed, storing without image: {e}");
                None
            }
        }
    }

    /// Resolve `food_item_id` for every ingredient via the fuzzy matcher; a
    /// store failure simply leaves all links null.
    async fn link_ingredients(&self, draft: &DraftRecipe) -> Vec<Ingredient> {
        let matcher = match self.food_items.list_all().await {
            Ok(items) => Some(FoodMatcher::new(items)),
            Err(e) => {
                warn!("food table read failed, skipping ingredient linking: {e}");
                None
            }
        };
        draft
            .ingredients
            .iter()
            .map(|ingredient| Ingredient {
                name: ingredient.name.clone(),
                quantity: ingredient.quantity,
                unit: ingredient.unit.clone(),
                food_item_id: matcher
                    .as_ref()
                    .and_then(|m| m.best_match(&ingredient.name))
                    .map(|item| item.id.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config::{AiVendor, ServerConfig};
    use crate::database::Database;
    use crate::models::FoodItem;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 3000,
            supabase_url: "http://127.0.0.1:9".to_owned(),
            supabase_jwt_secret: "x".repeat(32),
            supabase_service_key: "service".to_owned(),
            openai_api_key: Some("sk-test".to_owned()),
            gemini_api_key: None,
            ai_provider: AiVendor::OpenAi,
            ai_model: None,
            image_provider: AiVendor::OpenAi,
            image_model: None,
            daily_global_limit: 500,
            daily_user_limit: 50,
            hourly_global_limit: 100,
            admin_api_key: None,
            database_url: "sqlite::memory:".to_owned(),
            temp_dir: std::env::temp_dir(),
            ytdlp_bin: "yt-dlp".to_owned(),
        }
    }

    async fn persister() -> (RecipePersister, FoodItemStore) {
        let database = Database::connect("sqlite::memory:").await.unwrap();
        let food_items = FoodItemStore::new(database.pool().clone());
        let persister = RecipePersister::new(
            RecipeStore::new(database.pool().clone()),
            food_items.clone(),
            ObjectStorage::new(&test_config()),
        );
        (persister, food_items)
    }

    fn draft() -> DraftRecipe {
        DraftRecipe {
            title: "Salade de tomates".to_owned(),
            prep_time: Some(10),
            cook_time: None,
            total_time: Some(10),
            servings: Some(2),
            cuisine_origin: Some("française".to_owned()),
            meal_type: Some("déjeuner".to_owned()),
            diet_type: vec!["végétarien".to_owned()],
            calories: Some(180.0),
            proteins: Some(4.0),
            carbs: Some(12.0),
            fats: Some(11.0),
            equipment: vec!["sans cuisson".to_owned()],
            ingredients: vec![crate::llm::ExtractedIngredient {
                name: "tomates fraîches".to_owned(),
                quantity: Some(4.0),
                unit: None,
            }],
            steps: vec![crate::models::Step {
                order: 1,
                text: "Couper les tomates.".to_owned(),
                duration: Some(5),
                temperature: None,
                ingredients_used: vec!["tomates fraîches".to_owned()],
            }],
        }
    }

    #[tokio::test]
    async fn persist_links_ingredients_to_the_food_table() {
        let (persister, food_items) = persister().await;
        food_items
            .insert(&FoodItem {
                id: "food-tomate".to_owned(),
                name: "Tomate".to_owned(),
            })
            .await
            .unwrap();

        let user = Uuid::new_v4();
        let recipe = persister
            .persist(
                user,
                GenerationMode::Free,
                Platform::TikTok,
                Some("https://www.tiktok.com/@c/video/1".to_owned()),
                draft(),
                ImageSource::None,
            )
            .await
            .unwrap();

        assert_eq!(recipe.user_id, user);
        assert_eq!(
            recipe.ingredients[0].food_item_id.as_deref(),
            Some("food-tomate")
        );
        assert_eq!(recipe.steps.len(), 1);
        assert!(recipe.image_url.is_none());
    }

    #[tokio::test]
    async fn unreachable_thumbnail_demotes_to_null_image() {
        let (persister, _food) = persister().await;
        let recipe = persister
            .persist(
                Uuid::new_v4(),
                GenerationMode::Premium,
                Platform::YouTube,
                Some("https://youtu.be/abc".to_owned()),
                draft(),
                ImageSource::Remote("http://127.0.0.1:9/thumb.jpg".to_owned()),
            )
            .await
            .unwrap();
        assert!(recipe.image_url.is_none());
        assert_eq!(recipe.generation_mode, GenerationMode::Premium);
    }
}
