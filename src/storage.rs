// ABOUTME: Object store client for thumbnail download and immutable uploads
// ABOUTME: Composes platform-scoped object keys and returns public URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Object storage.
//!
//! Thumbnails are downloaded from their remote URL (10 s timeout, image
//! content types only), uploaded once to the `recipe-thumbnails` bucket under
//! a per-platform folder, and never touched again. The original remote
//! thumbnail is not retained.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};

const BUCKET: &str = "recipe-thumbnails";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_CONTROL_SECS: u32 = 3600;

/// A downloaded image ready for upload
#[derive(Debug, Clone)]
pub struct ImageBytes {
    /// Raw bytes
    pub data: Vec<u8>,
    /// MIME type, e.g. `image/jpeg`
    pub mime: String,
    /// File extension derived from the MIME subtype (`jpeg` becomes `jpg`)
    pub extension: String,
}

/// Object store client
#[derive(Clone)]
pub struct ObjectStorage {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl ObjectStorage {
    /// Build the client from server configuration
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    /// Download a remote image, rejecting non-image content types.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or a
    /// content type outside `image/*`.
    pub async fn download_image(&self, url: &str) -> AppResult<ImageBytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::external_service("thumbnail", e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "thumbnail",
                format!("download failed with HTTP {status}"),
            ));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_owned())
            .unwrap_or_default();
        if !mime.starts_with("image/") {
            return Err(AppError::external_service(
                "thumbnail",
                format!("unexpected content type '{mime}'"),
            ));
        }
        let extension = extension_for(&mime);

        let data = response
            .bytes()
            .await
            .map_err(|e| AppError::external_service("thumbnail", e.to_string()))?
            .to_vec();
        if data.is_empty() {
            return Err(AppError::external_service("thumbnail", "empty response body"));
        }
        Ok(ImageBytes {
            data,
            mime,
            extension,
        })
    }

    /// Upload an object (no overwrite) and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-success status.
    pub async fn upload(&self, key: &str, image: ImageBytes) -> AppResult<String> {
        let url = format!("{}/storage/v1/object/{BUCKET}/{key}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, &image.mime)
            .header(
                reqwest::header::CACHE_CONTROL,
                format!("max-age={CACHE_CONTROL_SECS}"),
            )
            .header("x-upsert", "false")
            .body(image.data)
            .send()
            .await
            .map_err(|e| AppError::external_service("object-store", e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::external_service(
                "object-store",
                format!("upload failed with HTTP {status}"),
            ));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{BUCKET}/{key}",
            self.base_url
        ))
    }
}

/// Compose a collision-resistant object key under the platform's folder
#[must_use]
pub fn object_key(platform: &str, extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!(
        "{platform}/{platform}-{}-{suffix:06}.{extension}",
        Utc::now().timestamp_millis()
    )
}

/// File extension for an image MIME type (`image/jpeg` becomes `jpg`)
#[must_use]
pub fn extension_for(mime: &str) -> String {
    match mime.strip_prefix("image/").unwrap_or("bin") {
        "jpeg" => "jpg".to_owned(),
        subtype => subtype.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_maps_to_jpg() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/webp"), "webp");
    }

    #[test]
    fn object_keys_are_platform_scoped_and_unique() {
        let a = object_key("tiktok", "jpg");
        let b = object_key("tiktok", "jpg");
        assert!(a.starts_with("tiktok/tiktok-"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }
}
