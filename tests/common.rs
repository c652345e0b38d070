// ABOUTME: Shared test utilities - in-memory store, mock pipeline, JWT helpers
// ABOUTME: Spawns a real HTTP server per test with RAII cleanup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs, dead_code)]

//! Shared test utilities for clipchef integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use clipchef::config::{AiVendor, ServerConfig};
use clipchef::context::ServerResources;
use clipchef::database::food_items::FoodItemStore;
use clipchef::database::profiles::ProfileStore;
use clipchef::database::recipes::RecipeStore;
use clipchef::database::Database;
use clipchef::errors::{AppError, AppResult};
use clipchef::llm::ExtractedIngredient;
use clipchef::models::{GenerationPreferences, Language, Platform, Step, VideoMetadata};
use clipchef::pipeline::{AnalysisOutput, DraftRecipe, GenerationOutput, VideoPipeline};
use clipchef::routes;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const TEST_SUPABASE_URL: &str = "https://test-project.supabase.co";

static INIT_LOGGER: Once = Once::new();

pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        supabase_url: TEST_SUPABASE_URL.to_owned(),
        supabase_jwt_secret: TEST_JWT_SECRET.to_owned(),
        supabase_service_key: "test-service-key".to_owned(),
        openai_api_key: Some("sk-test".to_owned()),
        gemini_api_key: None,
        ai_provider: AiVendor::OpenAi,
        ai_model: None,
        image_provider: AiVendor::OpenAi,
        image_model: None,
        daily_global_limit: 500,
        daily_user_limit: 50,
        hourly_global_limit: 100,
        admin_api_key: Some("test-admin-key".to_owned()),
        database_url: "sqlite::memory:".to_owned(),
        temp_dir: std::env::temp_dir(),
        ytdlp_bin: "yt-dlp".to_owned(),
    }
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    email: String,
    role: String,
    iss: String,
    exp: i64,
}

/// Mint a bearer token the test server accepts
pub fn make_token(user_id: Uuid) -> String {
    let claims = TestClaims {
        sub: user_id.to_string(),
        email: format!("user-{user_id}@example.com"),
        role: "authenticated".to_owned(),
        iss: format!("{TEST_SUPABASE_URL}/auth/v1"),
        exp: Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("failed to sign test token")
}

/// What the mock pipeline should do when reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    NotRecipe,
    ProviderFailure,
}

/// Pipeline stand-in: detects platforms like the real registry, then answers
/// from canned data after an optional delay
pub struct MockPipeline {
    pub behavior: MockBehavior,
    pub delay: Duration,
    provider_calls: AtomicUsize,
}

impl MockPipeline {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            provider_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(behavior: MockBehavior, delay: Duration) -> Self {
        Self {
            behavior,
            delay,
            provider_calls: AtomicUsize::new(0),
        }
    }

    /// How many times a provider would have been contacted
    pub fn provider_calls(&self) -> usize {
        self.provider_calls.load(Ordering::SeqCst)
    }

    fn detect(url: &str) -> AppResult<Platform> {
        if url.contains("tiktok.com") {
            Ok(Platform::TikTok)
        } else if url.contains("youtube.com") || url.contains("youtu.be") {
            Ok(Platform::YouTube)
        } else if url.contains("instagram.com") {
            Ok(Platform::Instagram)
        } else {
            Err(AppError::invalid_input(
                "PLATFORM_UNSUPPORTED",
                "this video platform is not supported",
            ))
        }
    }

    async fn respond(&self) -> AppResult<DraftRecipe> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.behavior {
            MockBehavior::Succeed => Ok(sample_draft()),
            MockBehavior::NotRecipe => Err(AppError::NotRecipe(
                "Ce lien ne contient pas de recette de cuisine.".to_owned(),
            )),
            MockBehavior::ProviderFailure => {
                Err(AppError::external_service("mock", "speech-to-text unavailable"))
            }
        }
    }
}

#[async_trait]
impl VideoPipeline for MockPipeline {
    async fn analyze(&self, url: &str, _language: Language) -> AppResult<AnalysisOutput> {
        let platform = Self::detect(url)?;
        let draft = self.respond().await?;
        Ok(AnalysisOutput {
            draft,
            platform,
            metadata: Some(VideoMetadata {
                title: Some("Pâtes au beurre faciles".to_owned()),
                author: Some("chef".to_owned()),
                author_url: None,
                thumbnail_url: None,
            }),
        })
    }

    async fn generate(
        &self,
        _preferences: &GenerationPreferences,
        _language: Language,
    ) -> AppResult<GenerationOutput> {
        let draft = self.respond().await?;
        Ok(GenerationOutput { draft, image: None })
    }
}

pub fn sample_draft() -> DraftRecipe {
    DraftRecipe {
        title: "Pâtes au beurre".to_owned(),
        prep_time: Some(5),
        cook_time: Some(10),
        total_time: Some(15),
        servings: Some(2),
        cuisine_origin: Some("italienne".to_owned()),
        meal_type: Some("dîner".to_owned()),
        diet_type: vec!["végétarien".to_owned()],
        calories: Some(450.0),
        proteins: Some(12.0),
        carbs: Some(70.0),
        fats: Some(14.0),
        equipment: vec!["plaque de cuisson".to_owned()],
        ingredients: vec![
            ExtractedIngredient {
                name: "pâtes".to_owned(),
                quantity: Some(200.0),
                unit: Some("g".to_owned()),
            },
            ExtractedIngredient {
                name: "beurre".to_owned(),
                quantity: Some(30.0),
                unit: Some("g".to_owned()),
            },
        ],
        steps: vec![
            Step {
                order: 1,
                text: "Cuire les pâtes al dente.".to_owned(),
                duration: Some(10),
                temperature: None,
                ingredients_used: vec!["pâtes".to_owned()],
            },
            Step {
                order: 2,
                text: "Ajouter le beurre hors du feu.".to_owned(),
                duration: Some(1),
                temperature: None,
                ingredients_used: vec!["beurre".to_owned()],
            },
        ],
    }
}

/// A running test server plus direct handles on its stores
pub struct TestServer {
    pub base_url: String,
    pub resources: Arc<ServerResources>,
    pub pipeline: Arc<MockPipeline>,
    pub profiles: ProfileStore,
    pub recipes: RecipeStore,
    pub food_items: FoodItemStore,
    task: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a server over an in-memory store and the given mock pipeline
pub async fn spawn_server(pipeline: MockPipeline) -> TestServer {
    init_test_logging();
    let database = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let profiles = ProfileStore::new(database.pool().clone());
    let recipes = RecipeStore::new(database.pool().clone());
    let food_items = FoodItemStore::new(database.pool().clone());

    let pipeline = Arc::new(pipeline);
    let resources = Arc::new(
        ServerResources::new(test_config(), database, pipeline.clone())
            .expect("server resources"),
    );

    let app = routes::router(Arc::clone(&resources));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        resources,
        pipeline,
        profiles,
        recipes,
        food_items,
        task,
    }
}

/// POST a JSON body with a bearer token and return (status, body)
pub async fn post_json(
    base_url: &str,
    path: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let client = reqwest::Client::new();
    let mut request = client.post(format!("{base_url}{path}")).json(&body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.expect("request failed");
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(serde_json::Value::Null);
    (status, body)
}
