// ABOUTME: YouTube platform handler using the public oEmbed endpoint for metadata
// ABOUTME: Description cleaning also strips chapter timestamps and bare URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{
    collapse_whitespace, hashtag_pattern, run_downloader, strip_pattern, timestamp_pattern,
    url_pattern, PlatformHandler,
};
use crate::errors::AppResult;
use crate::models::{Platform, VideoMetadata};

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
    thumbnail_url: Option<String>,
}

/// Handler for youtube.com and youtu.be URLs (shorts included)
pub struct YouTubeHandler {
    http: reqwest::Client,
    ytdlp_bin: String,
    pattern: Regex,
    hashtags: Regex,
    timestamps: Regex,
    urls: Regex,
}

impl YouTubeHandler {
    /// Build the handler
    #[must_use]
    pub fn new(http: reqwest::Client, ytdlp_bin: String) -> Self {
        #[allow(clippy::unwrap_used)] // static pattern, verified by tests
        let pattern =
            Regex::new(r"^https?://((www\.|m\.)?youtube\.com/(watch|shorts/)|youtu\.be/)")
                .unwrap();
        Self {
            http,
            ytdlp_bin,
            pattern,
            hashtags: hashtag_pattern(),
            timestamps: timestamp_pattern(),
            urls: url_pattern(),
        }
    }
}

#[async_trait]
impl PlatformHandler for YouTubeHandler {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    async fn fetch_metadata(&self, url: &str) -> Option<VideoMetadata> {
        let response = self
            .http
            .get(OEMBED_ENDPOINT)
            .query(&[("url", url), ("format", "json")])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "youtube oEmbed lookup failed");
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
        let text = strip_pattern(text, &self.urls);
        let text = strip_pattern(&text, &self.hashtags);
        let text = strip_pattern(&text, &self.timestamps);
        collapse_whitespace(&text)
    }
}
