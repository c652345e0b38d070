// ABOUTME: OpenAI chat-completions and image-generation providers
// ABOUTME: JSON mode is requested so responses parse without fence stripping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use super::{ChatRequest, ChatResponse, ImagePayload, ImageProvider, LlmProvider};
use crate::errors::{AppError, AppResult};

const CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const IMAGES_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

/// OpenAI chat-completions text provider
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Build with an optional model override
    #[must_use]
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .http
            .post(CHAT_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service("openai", e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "openai",
                format!("chat completion failed with HTTP {status}"),
            ));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("openai", format!("JSON parse error: {e}")))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::external_service("openai", "completion had no content"))?;

        Ok(ChatResponse {
            content,
            model: self.model.clone(),
        })
    }
}

/// OpenAI image-generation provider
pub struct OpenAiImageProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiImageProvider {
    /// Build with an optional model override
    #[must_use]
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_owned()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> AppResult<ImagePayload> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });

        let response = self
            .http
            .post(IMAGES_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service("openai", e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "openai",
                format!("image generation failed with HTTP {status}"),
            ));
        }

        let images: ImagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("openai", format!("JSON parse error: {e}")))?;
        let datum = images
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service("openai", "image response was empty"))?;

        if let Some(url) = datum.url {
            return Ok(ImagePayload::Url(url));
        }
        if let Some(encoded) = datum.b64_json {
            let data = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| {
                    AppError::external_service("openai", format!("invalid base64 image: {e}"))
                })?;
            return Ok(ImagePayload::Bytes {
                data,
                mime: "image/png".to_owned(),
            });
        }
        Err(AppError::external_service(
            "openai",
            "image response had neither url nor b64_json",
        ))
    }
}
