// ABOUTME: Platform handler registry with URL detection, audio extraction, and cleanup
// ABOUTME: Shares the yt-dlp subprocess runner and description-cleaning primitives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Platform registry.
//!
//! Each handler declares its URL pattern, metadata retrieval (oEmbed or
//! Open-Graph scrape), audio extraction, and description cleaning. Detection
//! returns the first matching handler; no match is `PLATFORM_UNSUPPORTED` and
//! happens before any provider is contacted. `extract_audio` fails loudly when
//! the downloader exits non-zero or produces no file.

pub mod instagram;
pub mod tiktok;
pub mod youtube;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Platform, VideoMetadata};

/// External HTTP timeout for oEmbed and Open-Graph calls
pub(crate) const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on a downloader run
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// One supported video platform
#[async_trait]
pub trait PlatformHandler: Send + Sync {
    /// Handler name for logs
    fn name(&self) -> &'static str;

    /// Platform variant persisted with the recipe
    fn platform(&self) -> Platform;

    /// Whether this handler claims the URL
    fn matches(&self, url: &str) -> bool;

    /// Platform-specific metadata; `None` on any retrieval failure
    async fn fetch_metadata(&self, url: &str) -> Option<VideoMetadata>;

    /// Download the video's audio track into `output_dir`, returning the
    /// local path of a uniquely named file.
    ///
    /// # Errors
    ///
    /// Returns an error when the downloader exits non-zero or produces no
    /// usable file, never a silently empty file.
    async fn extract_audio(&self, url: &str, output_dir: &Path) -> AppResult<PathBuf>;

    /// Collapse whitespace and strip platform noise (hashtags, and where
    /// appropriate timestamps and URLs) from a description
    fn clean_description(&self, text: &str) -> String;

    /// Best-effort removal of an extracted file
    fn cleanup(&self, path: &Path) {
        cleanup_file(path);
    }
}

/// Ordered set of platform handlers
pub struct PlatformRegistry {
    handlers: Vec<Box<dyn PlatformHandler>>,
}

impl PlatformRegistry {
    /// Build the standard registry (TikTok, YouTube, Instagram)
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            handlers: vec![
                Box::new(tiktok::TikTokHandler::new(
                    http.clone(),
                    config.ytdlp_bin.clone(),
                )),
                Box::new(youtube::YouTubeHandler::new(
                    http.clone(),
                    config.ytdlp_bin.clone(),
                )),
                Box::new(instagram::InstagramHandler::new(
                    http,
                    config.ytdlp_bin.clone(),
                )),
            ],
        }
    }

    /// First handler whose pattern matches the URL.
    ///
    /// # Errors
    ///
    /// Returns `PLATFORM_UNSUPPORTED` (400) when nothing matches.
    pub fn detect(&self, url: &str) -> AppResult<&dyn PlatformHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(url))
            .map(|handler| handler.as_ref())
            .ok_or_else(|| {
                AppError::invalid_input(
                    "PLATFORM_UNSUPPORTED",
                    "this video platform is not supported",
                )
            })
    }
}

/// Run the downloader and return the produced audio file.
///
/// # Errors
///
/// Returns an error on spawn failure, non-zero exit, timeout, or a
/// missing/empty output file.
pub(crate) async fn run_downloader(
    bin: &str,
    url: &str,
    output_dir: &Path,
) -> AppResult<PathBuf> {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    let stem = format!("audio-{}-{suffix:06}", Utc::now().timestamp_millis());
    // The downloader substitutes %(ext)s; post-processing leaves an .mp3
    let template = output_dir.join(format!("{stem}.%(ext)s"));
    let output = output_dir.join(format!("{stem}.mp3"));

    debug!(%url, output = %output.display(), "extracting audio track");
    let run = Command::new(bin)
        .arg("-x")
        .arg("--audio-format")
        .arg("mp3")
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("-o")
        .arg(&template)
        .arg(url)
        .kill_on_drop(true)
        .output();

    let result = tokio::time::timeout(DOWNLOAD_TIMEOUT, run)
        .await
        .map_err(|_| {
            cleanup_file(&output);
            AppError::external_service("yt-dlp", "audio extraction timed out")
        })?
        .map_err(|e| AppError::external_service("yt-dlp", format!("failed to run: {e}")))?;

    if !result.status.success() {
        cleanup_file(&output);
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(AppError::external_service(
            "yt-dlp",
            format!(
                "exited with {}: {}",
                result.status,
                stderr.lines().last().unwrap_or("no output")
            ),
        ));
    }

    let size = tokio::fs::metadata(&output).await.map(|m| m.len()).ok();
    match size {
        Some(len) if len > 0 => Ok(output),
        _ => {
            cleanup_file(&output);
            Err(AppError::external_service(
                "yt-dlp",
                "downloader produced no audio file",
            ))
        }
    }
}

/// Best-effort file removal shared by handlers and the pipeline guard
pub(crate) fn cleanup_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "temp file cleanup failed: {e}");
        }
    }
}

// -- Description-cleaning primitives shared by the handlers --

pub(crate) fn strip_pattern(text: &str, pattern: &Regex) -> String {
    pattern.replace_all(text, " ").into_owned()
}

/// Collapse runs of whitespace into single spaces and trim. Applied last so
/// every cleaner is idempotent.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn hashtag_pattern() -> Regex {
    static_pattern(r"#[^\s#]+")
}

pub(crate) fn url_pattern() -> Regex {
    static_pattern(r"https?://\S+")
}

pub(crate) fn timestamp_pattern() -> Regex {
    static_pattern(r"\b\d{1,2}:\d{2}(:\d{2})?\b")
}

fn static_pattern(pattern: &str) -> Regex {
    #[allow(clippy::unwrap_used)] // compile-time constant patterns, verified by tests
    let regex = Regex::new(pattern).unwrap();
    regex
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 3000,
            supabase_url: "https://project.supabase.co".to_owned(),
            supabase_jwt_secret: "x".repeat(32),
            supabase_service_key: "service".to_owned(),
            openai_api_key: Some("sk-test".to_owned()),
            gemini_api_key: None,
            ai_provider: crate::config::AiVendor::OpenAi,
            ai_model: None,
            image_provider: crate::config::AiVendor::OpenAi,
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

    #[test]
    fn detection_picks_the_first_matching_handler() {
        let registry = PlatformRegistry::new(&test_config());
        let handler = registry
            .detect("https://www.tiktok.com/@chef/video/7234567890123456789")
            .unwrap();
        assert_eq!(handler.platform(), Platform::TikTok);

        let handler = registry.detect("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(handler.platform(), Platform::YouTube);

        let handler = registry
            .detect("https://www.instagram.com/reel/Cxyz123/")
            .unwrap();
        assert_eq!(handler.platform(), Platform::Instagram);
    }

    #[test]
    fn unsupported_platform_is_rejected() {
        let registry = PlatformRegistry::new(&test_config());
        let err = registry
            .detect("https://vimeo.com/123456789")
            .err()
            .unwrap();
        assert_eq!(err.code(), "PLATFORM_UNSUPPORTED");
    }

    #[test]
    fn whitespace_collapse_is_idempotent() {
        let once = collapse_whitespace("  a \t b\n\nc ");
        assert_eq!(once, "a b c");
        assert_eq!(collapse_whitespace(&once), once);
    }

    #[tokio::test]
    async fn missing_downloader_binary_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_downloader("/nonexistent/clipchef-ytdlp", "https://example.com", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalService { .. }));
    }

    #[tokio::test]
    async fn downloader_producing_no_file_fails_loudly() {
        // `true` exits zero without writing anything, which must not pass
        let dir = tempfile::tempdir().unwrap();
        let err = run_downloader("true", "https://example.com", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no audio file"), "{err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
