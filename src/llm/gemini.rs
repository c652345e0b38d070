// ABOUTME: Google Gemini generateContent providers for text and inline-image output
// ABOUTME: Text requests pin a JSON response MIME type; images come back as inline base64
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use super::{ChatRequest, ChatResponse, ImagePayload, ImageProvider, LlmProvider};
use crate::errors::{AppError, AppResult};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Gemini text provider
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
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
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    data: Option<String>,
}

async fn generate_content(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    body: &serde_json::Value,
) -> AppResult<GenerateContentResponse> {
    let url = format!("{API_BASE}/{model}:generateContent");
    let response = http
        .post(&url)
        .query(&[("key", api_key)])
        .json(body)
        .send()
        .await
        .map_err(|e| AppError::external_service("gemini", e.to_string()))?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(AppError::external_service(
            "gemini",
            format!("generateContent failed with HTTP {status}"),
        ));
    }
    response
        .json()
        .await
        .map_err(|e| AppError::external_service("gemini", format!("JSON parse error: {e}")))
}

fn first_parts(response: GenerateContentResponse) -> Vec<Part> {
    response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        // Gemini takes the system instruction as its own top-level field
        let mut body = json!({
            "contents": [{"parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": "application/json",
            },
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = generate_content(&self.http, &self.api_key, &self.model, &body).await?;
        let content = first_parts(response)
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| AppError::external_service("gemini", "completion had no text part"))?;

        Ok(ChatResponse {
            content,
            model: self.model.clone(),
        })
    }
}

/// Gemini image provider (inline base64 responses)
pub struct GeminiImageProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiImageProvider {
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

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> AppResult<ImagePayload> {
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseModalities": ["IMAGE", "TEXT"],
            },
        });

        let response = generate_content(&self.http, &self.api_key, &self.model, &body).await?;
        let inline = first_parts(response)
            .into_iter()
            .find_map(|part| part.inline_data)
            .ok_or_else(|| AppError::external_service("gemini", "response had no image part"))?;

        let encoded = inline
            .data
            .ok_or_else(|| AppError::external_service("gemini", "image part had no data"))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                AppError::external_service("gemini", format!("invalid base64 image: {e}"))
            })?;
        Ok(ImagePayload::Bytes {
            data,
            mime: inline.mime_type.unwrap_or_else(|| "image/png".to_owned()),
        })
    }
}
