// ABOUTME: Speech-to-text client uploading extracted audio to the transcription API
// ABOUTME: Trait seam so the pipeline can run against a mock in tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Audio transcription.
//!
//! The extracted audio file is uploaded to the OpenAI transcription endpoint
//! with the caller's language hint. There is no in-core retry; a transient
//! provider failure surfaces as a 500 to the caller.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::models::Language;

const TRANSCRIPTION_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const MODEL: &str = "whisper-1";

/// Speech-to-text seam
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a local audio file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or the provider fails.
    async fn transcribe(&self, audio_path: &Path, language: Language) -> AppResult<String>;
}

/// OpenAI Whisper transcription client
pub struct WhisperTranscriber {
    http: reqwest::Client,
    api_key: String,
}

impl WhisperTranscriber {
    /// Build the client
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Language) -> AppResult<String> {
        let bytes = tokio::fs::read(audio_path).await.map_err(|e| {
            AppError::external_service("whisper", format!("cannot read audio file: {e}"))
        })?;
        let file_name = audio_path
            .file_name()
            .map_or_else(|| "audio.mp3".to_owned(), |n| n.to_string_lossy().into_owned());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| AppError::external_service("whisper", e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", MODEL)
            .text("language", language.as_str())
            .part("file", part);

        let response = self
            .http
            .post(TRANSCRIPTION_ENDPOINT)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::external_service("whisper", e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "whisper",
                format!("transcription failed with HTTP {status}"),
            ));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("whisper", format!("JSON parse error: {e}")))?;
        Ok(transcription.text)
    }
}
