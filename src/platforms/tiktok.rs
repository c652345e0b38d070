// ABOUTME: TikTok platform handler using the public oEmbed endpoint for metadata
// ABOUTME: Audio extraction delegates to the shared downloader subprocess runner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{
    collapse_whitespace, hashtag_pattern, run_downloader, strip_pattern, PlatformHandler,
};
use crate::errors::AppResult;
use crate::models::{Platform, VideoMetadata};

const OEMBED_ENDPOINT: &str = "https://www.tiktok.com/oembed";

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
    thumbnail_url: Option<String>,
}

/// Handler for tiktok.com video URLs
pub struct TikTokHandler {
    http: reqwest::Client,
    ytdlp_bin: String,
    pattern: Regex,
    hashtags: Regex,
}

impl TikTokHandler {
    /// Build the handler
    #[must_use]
    pub fn new(http: reqwest::Client, ytdlp_bin: String) -> Self {
        #[allow(clippy::unwrap_used)] // static pattern, verified by tests
        let pattern = Regex::new(r"^https?://(www\.|vm\.|vt\.)?tiktok\.com/").unwrap();
        Self {
            http,
            ytdlp_bin,
            pattern,
            hashtags: hashtag_pattern(),
        }
    }
}

#[async_trait]
impl PlatformHandler for TikTokHandler {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    async fn fetch_metadata(&self, url: &str) -> Option<VideoMetadata> {
        let response = self
            .http
            .get(OEMBED_ENDPOINT)
            .query(&[("url", url)])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "tiktok oEmbed lookup failed");
            return None;
        }
        let oembed: OembedResponse = response.json().await.ok()?;
        Some(VideoMetadata {
            title: oembed.title,
            author: oembed.author_name,
            author_url: oembed.author_url,
            thumbnail_url: oembed.thumbnail_url,
        })
    }

    async fn extract_audio(&self, url: &str, output_dir: &Path) -> AppResult<PathBuf> {
        run_downloader(&self.ytdlp_bin, url, output_dir).await
    }

    fn clean_description(&self, text: &str) -> String {
        collapse_whitespace(&strip_pattern(text, &self.hashtags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> TikTokHandler {
        TikTokHandler::new(reqwest::Client::new(), "yt-dlp".to_owned())
    }

    #[test]
    fn matches_canonical_and_short_urls() {
        let handler = handler();
        assert!(handler.matches("https://www.tiktok.com/@chef/video/7234567890123456789"));
        assert!(handler.matches("https://vm.tiktok.com/ZMabcdef/"));
        assert!(!handler.matches("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn cleaning_strips_hashtags_and_is_idempotent() {
        let handler = handler();
        let cleaned =
            handler.clean_description("Pasta  magique #fyp #recette #pourtoi   facile");
        assert_eq!(cleaned, "Pasta magique facile");
        assert!(!cleaned.contains('#'));
        assert!(!cleaned.contains("  "));
        assert_eq!(handler.clean_description(&cleaned), cleaned);
    }
}
