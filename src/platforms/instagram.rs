// ABOUTME: Instagram platform handler scraping Open-Graph tags for metadata
// ABOUTME: No public oEmbed without credentials, so the post HTML is fetched directly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{
    collapse_whitespace, hashtag_pattern, run_downloader, strip_pattern, url_pattern,
    PlatformHandler,
};
use crate::errors::AppResult;
use crate::models::{Platform, VideoMetadata};

const SCRAPE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36";

/// Handler for instagram.com reel/post URLs
pub struct InstagramHandler {
    http: reqwest::Client,
    ytdlp_bin: String,
    pattern: Regex,
    hashtags: Regex,
    urls: Regex,
}

impl InstagramHandler {
    /// Build the handler
    #[must_use]
    pub fn new(http: reqwest::Client, ytdlp_bin: String) -> Self {
        #[allow(clippy::unwrap_used)] // static pattern, verified by tests
        let pattern =
            Regex::new(r"^https?://(www\.)?instagram\.com/(reel|reels|p|tv)/").unwrap();
        Self {
            http,
            ytdlp_bin,
            pattern,
            hashtags: hashtag_pattern(),
            urls: url_pattern(),
        }
    }
}

#[async_trait]
impl PlatformHandler for InstagramHandler {
    fn name(&self) -> &'static str {
        "instagram"
    }

    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    async fn fetch_metadata(&self, url: &str) -> Option<VideoMetadata> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, SCRAPE_USER_AGENT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "instagram page fetch failed");
            return None;
        }
        let html = response.text().await.ok()?;
        let title = og_content(&html, "og:title");
        let thumbnail_url = og_content(&html, "og:image");
        if title.is_none() && thumbnail_url.is_none() {
            return None;
        }
        Some(VideoMetadata {
            title,
            author: None,
            author_url: None,
            thumbnail_url,
        })
    }

    async fn extract_audio(&self, url: &str, output_dir: &Path) -> AppResult<PathBuf> {
        run_downloader(&self.ytdlp_bin, url, output_dir).await
    }

    fn clean_description(&self, text: &str) -> String {
        let text = strip_pattern(text, &self.urls);
        let text = strip_pattern(&text, &self.hashtags);
        collapse_whitespace(&text)
    }
}

/// Extract one Open-Graph property, tolerating either attribute order
fn og_content(html: &str, property: &str) -> Option<String> {
    let escaped = regex::escape(property);
    let patterns = [
        format!(r#"<meta[^>]*property="{escaped}"[^>]*content="([^"]*)""#),
        format!(r#"<meta[^>]*content="([^"]*)"[^>]*property="{escaped}""#),
    ];
    for pattern in &patterns {
        if let Some(captures) = Regex::new(pattern).ok()?.captures(html) {
            let raw = captures.get(1)?.as_str();
            let decoded = decode_entities(raw);
            if !decoded.is_empty() {
                return Some(decoded);
            }
        }
    }
    None
}

/// Minimal HTML entity decoding for meta contents
fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> InstagramHandler {
        InstagramHandler::new(reqwest::Client::new(), "yt-dlp".to_owned())
    }

    #[test]
    fn matches_reels_and_posts() {
        let handler = handler();
        assert!(handler.matches("https://www.instagram.com/reel/Cxyz123/"));
        assert!(handler.matches("https://instagram.com/p/Cabc456/"));
        assert!(!handler.matches("https://www.instagram.com/some_account/"));
    }

    #[test]
    fn open_graph_extraction_handles_both_attribute_orders() {
        let html = r#"<head>
            <meta property="og:title" content="Tarte aux pommes &amp; caramel" />
            <meta content="https://cdn.example.com/thumb.jpg" property="og:image" />
        </head>"#;
        assert_eq!(
            og_content(html, "og:title").as_deref(),
            Some("Tarte aux pommes & caramel")
        );
        assert_eq!(
            og_content(html, "og:image").as_deref(),
            Some("https://cdn.example.com/thumb.jpg")
        );
        assert!(og_content(html, "og:video").is_none());
    }

    #[test]
    fn cleaning_strips_hashtags_and_urls() {
        let handler = handler();
        let cleaned = handler
            .clean_description("Gnocchis maison #foodporn #recipe https://linkin.bio/chef suivez-moi");
        assert_eq!(cleaned, "Gnocchis maison suivez-moi");
        assert_eq!(handler.clean_description(&cleaned), cleaned);
    }
}
