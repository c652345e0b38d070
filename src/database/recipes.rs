// ABOUTME: Recipe, ingredient, and step persistence with hydration and owner cloning
// ABOUTME: Also serves the idempotence lookups keyed on normalized source URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! `recipes` / `ingredients` / `steps` operations.
//!
//! Writes are intentionally not transactional across tables: the recipe row is
//! inserted first, child batches after, and a child failure leaves the recipe
//! in place (the caller logs it). Hydration is a full read with ingredients
//! ordered by name and steps by their dense 1-based order.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{GenerationMode, Ingredient, Platform, Recipe, Step};

/// Store handle for recipes and their children
#[derive(Clone)]
pub struct RecipeStore {
    pool: SqlitePool,
}

impl RecipeStore {
    /// Wrap a pool handle
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the recipe row only (children go through the batch inserts).
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn insert_recipe_row(&self, recipe: &Recipe) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO recipes (
                id, user_id, created_at, title, source_url, platform,
                prep_time, cook_time, total_time, servings,
                cuisine_origin, meal_type, diet_type,
                calories, proteins, carbs, fats,
                equipment, image_url, generation_mode
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )",
        )
        .bind(recipe.id.to_string())
        .bind(recipe.user_id.to_string())
        .bind(recipe.created_at.to_rfc3339())
        .bind(&recipe.title)
        .bind(&recipe.source_url)
        .bind(recipe.platform.as_str())
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.total_time)
        .bind(recipe.servings)
        .bind(&recipe.cuisine_origin)
        .bind(&recipe.meal_type)
        .bind(serde_json::to_string(&recipe.diet_type)?)
        .bind(recipe.calories)
        .bind(recipe.proteins)
        .bind(recipe.carbs)
        .bind(recipe.fats)
        .bind(serde_json::to_string(&recipe.equipment)?)
        .bind(&recipe.image_url)
        .bind(recipe.generation_mode.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("recipe insert failed: {e}")))?;
        Ok(())
    }

    /// Insert the ingredient batch for a recipe.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure; the batch rolls back as a unit but
    /// the parent recipe is untouched.
    pub async fn insert_ingredients(
        &self,
        recipe_id: Uuid,
        ingredients: &[Ingredient],
    ) -> AppResult<()> {
        if ingredients.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("failed to begin transaction: {e}")))?;
        for ingredient in ingredients {
            sqlx::query(
                "INSERT INTO ingredients (id, recipe_id, name, quantity, unit, food_item_id)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(recipe_id.to_string())
            .bind(&ingredient.name)
            .bind(ingredient.quantity)
            .bind(&ingredient.unit)
            .bind(&ingredient.food_item_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("ingredient insert failed: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("failed to commit ingredients: {e}")))?;
        Ok(())
    }

    /// Insert the step batch for a recipe, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure; the batch rolls back as a unit but
    /// the parent recipe is untouched.
    pub async fn insert_steps(&self, recipe_id: Uuid, steps: &[Step]) -> AppResult<()> {
        if steps.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("failed to begin transaction: {e}")))?;
        for step in steps {
            sqlx::query(
                "INSERT INTO steps (id, recipe_id, step_order, text, duration, temperature, ingredients_used)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(recipe_id.to_string())
            .bind(step.order)
            .bind(&step.text)
            .bind(step.duration)
            .bind(step.temperature)
            .bind(serde_json::to_string(&step.ingredients_used)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("step insert failed: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("failed to commit steps: {e}")))?;
        Ok(())
    }

    /// Full read: recipe row plus ingredients ordered by name and steps
    /// ordered by their position.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure or malformed stored data.
    pub async fn get_hydrated(&self, recipe_id: Uuid) -> AppResult<Option<Recipe>> {
        let row = sqlx::query("SELECT * FROM recipes WHERE id = $1")
            .bind(recipe_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("recipe read failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut recipe = row_to_recipe(&row)?;

        let ingredient_rows = sqlx::query(
            "SELECT name, quantity, unit, food_item_id FROM ingredients
             WHERE recipe_id = $1 ORDER BY name",
        )
        .bind(recipe_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("ingredient read failed: {e}")))?;
        recipe.ingredients = ingredient_rows
            .iter()
            .map(|r| Ingredient {
                name: r.get("name"),
                quantity: r.get("quantity"),
                unit: r.get("unit"),
                food_item_id: r.get("food_item_id"),
            })
            .collect();

        let step_rows = sqlx::query(
            "SELECT step_order, text, duration, temperature, ingredients_used FROM steps
             WHERE recipe_id = $1 ORDER BY step_order",
        )
        .bind(recipe_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("step read failed: {e}")))?;
        recipe.steps = step_rows
            .iter()
            .map(row_to_step)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Some(recipe))
    }

    /// Most recent recipe of this owner whose `source_url` begins with the
    /// normalized URL.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn find_latest_for_owner(
        &self,
        user_id: Uuid,
        normalized_url: &str,
    ) -> AppResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT id FROM recipes
             WHERE user_id = $1 AND source_url IS NOT NULL AND instr(source_url, $2) = 1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id.to_string())
        .bind(normalized_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("owner lookup failed: {e}")))?;
        parse_id(row)
    }

    /// Most recent recipe of any owner whose `source_url` begins with the
    /// normalized URL.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn find_latest_global(&self, normalized_url: &str) -> AppResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT id FROM recipes
             WHERE source_url IS NOT NULL AND instr(source_url, $1) = 1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(normalized_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("global lookup failed: {e}")))?;
        parse_id(row)
    }

    /// Copy a recipe with its children to a new owner. The clone is a
    /// complete, independent row set with a fresh id; `source_url`, platform,
    /// classification, times, nutrition, and `image_url` are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error when the source recipe does not exist or the store
    /// fails.
    pub async fn clone_for_owner(
        &self,
        recipe_id: Uuid,
        new_owner: Uuid,
        mode: GenerationMode,
    ) -> AppResult<Uuid> {
        let source = self
            .get_hydrated(recipe_id)
            .await?
            .ok_or_else(|| AppError::database(format!("recipe {recipe_id} not found for clone")))?;

        let clone = Recipe {
            id: Uuid::new_v4(),
            user_id: new_owner,
            created_at: Utc::now(),
            generation_mode: mode,
            ..source
        };
        self.insert_recipe_row(&clone).await?;
        self.insert_ingredients(clone.id, &clone.ingredients).await?;
        self.insert_steps(clone.id, &clone.steps).await?;
        Ok(clone.id)
    }
}

fn parse_id(row: Option<SqliteRow>) -> AppResult<Option<Uuid>> {
    row.map(|r| {
        let id: String = r.get("id");
        Uuid::parse_str(&id).map_err(|e| AppError::internal(format!("invalid recipe id: {e}")))
    })
    .transpose()
}

fn row_to_step(row: &SqliteRow) -> AppResult<Step> {
    let ingredients_used: Option<String> = row.get("ingredients_used");
    Ok(Step {
        order: row.get("step_order"),
        text: row.get("text"),
        duration: row.get("duration"),
        temperature: row.get("temperature"),
        ingredients_used: ingredients_used
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn row_to_recipe(row: &SqliteRow) -> AppResult<Recipe> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");
    let platform: String = row.get("platform");
    let generation_mode: String = row.get("generation_mode");
    let diet_type: Option<String> = row.get("diet_type");
    let equipment: Option<String> = row.get("equipment");

    Ok(Recipe {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::internal(format!("invalid recipe id: {e}")))?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| AppError::internal(format!("invalid user id: {e}")))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| AppError::internal(format!("invalid created_at: {e}")))?
            .with_timezone(&Utc),
        title: row.get("title"),
        source_url: row.get("source_url"),
        platform: Platform::from_stored(&platform),
        prep_time: row.get("prep_time"),
        cook_time: row.get("cook_time"),
        total_time: row.get("total_time"),
        servings: row.get("servings"),
        cuisine_origin: row.get("cuisine_origin"),
        meal_type: row.get("meal_type"),
        diet_type: diet_type
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?
            .unwrap_or_default(),
        calories: row.get("calories"),
        proteins: row.get("proteins"),
        carbs: row.get("carbs"),
        fats: row.get("fats"),
        equipment: equipment
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?
            .unwrap_or_default(),
        image_url: row.get("image_url"),
        generation_mode: GenerationMode::from_stored(&generation_mode),
        ingredients: Vec::new(),
        steps: Vec::new(),
    })
}
