//! Uploaded post images
//!
//! Images are checked against the configured MIME allow-list and by their
//! leading bytes, then written below `<media root>/posts/`.

use crate::config::MediaConfig;
use crate::models::UploadedImage;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";

/// Subdirectory of the media root holding post images
pub const POSTS_DIR: &str = "posts";

/// Identify an image by its signature, returning its MIME type
pub fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") && bytes.len() >= 26 {
        Some("image/bmp")
    } else {
        None
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/gif" => "gif",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// Reduce an uploaded file name to a safe single path component
pub fn sanitize_file_name(name: &str, mime: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    let (stem, ext) = split_extension(&cleaned);
    if stem.is_empty() {
        return format!("image.{}", extension_for(mime));
    }
    match ext {
        Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
        None => format!("{}.{}", stem, extension_for(mime)),
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        Some((stem, _)) => (stem, None),
        None => (name, None),
    }
}

/// Validates and stores post images
pub struct MediaService {
    config: MediaConfig,
}

impl MediaService {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Media root, served under `/media/`
    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Check an upload, returning the form error message on failure
    pub fn validate(&self, image: &UploadedImage) -> Result<&'static str, String> {
        if image.bytes.is_empty() {
            return Err(EMPTY_FILE.to_string());
        }
        if image.bytes.len() as u64 > self.config.max_file_size {
            return Err(format!(
                "File too large. Maximum size is {} MB.",
                self.config.max_file_size / 1024 / 1024
            ));
        }

        let declared = image.content_type.as_str();
        let generic = declared.is_empty() || declared == "application/octet-stream";
        if !generic && !self.config.is_type_allowed(declared) {
            return Err(INVALID_IMAGE.to_string());
        }

        match detect_image_type(&image.bytes) {
            Some(mime) if self.config.is_type_allowed(mime) => Ok(mime),
            _ => Err(INVALID_IMAGE.to_string()),
        }
    }

    /// Write a validated image and return its path relative to the media root
    pub async fn save(&self, image: &UploadedImage, mime: &str) -> Result<String> {
        let dir = self.config.path.join(POSTS_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let name = sanitize_file_name(&image.file_name, mime);
        let target = self.available_path(&dir, &name).await?;
        fs::write(&target, &image.bytes)
            .await
            .with_context(|| format!("Failed to write image {}", target.display()))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);
        tracing::debug!("Stored image {}/{}", POSTS_DIR, file_name);
        Ok(format!("{}/{}", POSTS_DIR, file_name))
    }

    /// `dir/name`, or `dir/stem_<random>.ext` when that is taken
    async fn available_path(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let candidate = dir.join(name);
        if !fs::try_exists(&candidate).await.context("Failed to inspect media directory")? {
            return Ok(candidate);
        }

        let (stem, ext) = split_extension(name);
        loop {
            let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
            let renamed = match ext {
                Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
                None => format!("{}_{}", stem, suffix),
            };
            let candidate = dir.join(renamed);
            if !fs::try_exists(&candidate).await.context("Failed to inspect media directory")? {
                return Ok(candidate);
            }
        }
    }
}
