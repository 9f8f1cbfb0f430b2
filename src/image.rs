// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Image upload.
//!
//! Images are committed to the assets directory of the site like any other
//! file, and served through the jsDelivr CDN, which mirrors public GitHub
//! repositories.

use crate::{
    config::{HexoLayout, RepoCoordinates},
    store::{FileStore, StoreError},
};

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

/// Base URL of jsDelivr GitHub mirror.
pub const CDN_BASE: &str = "https://cdn.jsdelivr.net/gh";

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Store path of image.
    pub path: String,

    /// Sanitized file name, without timestamp prefix.
    pub filename: String,

    /// Public CDN URL of image.
    pub url: String,
}

impl UploadedImage {
    /// Markdown snippet that embeds image.
    pub fn markdown(&self, alt: &str) -> String {
        markdown_image(alt, &self.url)
    }
}

/// Upload images into assets directory of site.
#[derive(Debug, Clone)]
pub struct ImageUploader<S>
where
    S: FileStore,
{
    store: S,
    repo: RepoCoordinates,
    layout: HexoLayout,
}

impl<S> ImageUploader<S>
where
    S: FileStore,
{
    /// Construct new image uploader.
    pub fn new(store: S, repo: RepoCoordinates, layout: HexoLayout) -> Self {
        Self {
            store,
            repo,
            layout,
        }
    }

    /// Upload image.
    pub async fn upload(&self, bytes: &[u8], filename: &str) -> Result<UploadedImage> {
        self.upload_at(bytes, filename, Utc::now()).await
    }

    /// Upload image as if it were uploaded at given time.
    ///
    /// The time prefix keeps repeated uploads of the same file name apart.
    ///
    /// # Errors
    ///
    /// - Return [`ImageError::Empty`] if there is nothing to upload.
    /// - Return [`ImageError::Store`] if the write fails.
    #[instrument(skip(self, bytes, now), level = "debug")]
    pub async fn upload_at(
        &self,
        bytes: &[u8],
        filename: &str,
        now: DateTime<Utc>,
    ) -> Result<UploadedImage> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let filename = sanitize_filename(filename);
        let path = format!(
            "{}/{}-{filename}",
            self.layout.assets.trim_end_matches('/'),
            now.timestamp_millis()
        );
        let receipt = self
            .store
            .write(
                &path,
                bytes,
                None,
                &format!("feat: upload image {filename}"),
            )
            .await?;
        info!("uploaded {} bytes to {:?}", bytes.len(), receipt.path);

        Ok(UploadedImage {
            url: cdn_url(&self.repo, &receipt.path),
            path: receipt.path,
            filename,
        })
    }
}

/// Replace everything but ASCII letters, digits, dots, and dashes by dashes.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let safe = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect::<String>();

    if safe.trim_matches(['.', '-']).is_empty() {
        "image".into()
    } else {
        safe
    }
}

/// Public jsDelivr URL of a file in repository.
pub fn cdn_url(repo: &RepoCoordinates, path: &str) -> String {
    format!(
        "{CDN_BASE}/{}/{}@{}/{}",
        repo.owner,
        repo.repo,
        repo.branch,
        path.trim_start_matches('/')
    )
}

/// Markdown image snippet.
pub fn markdown_image(alt: &str, url: &str) -> String {
    format!("![{alt}]({url})")
}

/// Image upload error types.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Nothing to upload.
    #[error("image is empty")]
    Empty,

    /// Store write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = ImageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("cat.png", "cat.png"; "already safe")]
    #[test_case("my cat (1).JPG", "my-cat--1-.JPG"; "spaces and parens")]
    #[test_case("photos/2024/kätzchen.webp", "k-tzchen.webp"; "directory and non ascii")]
    #[test_case("...", "image"; "nothing left")]
    #[test]
    fn sanitize_filenames(input: &str, expect: &str) {
        pretty_assertions::assert_eq!(sanitize_filename(input), expect);
    }

    #[tokio::test]
    async fn upload_lands_in_assets_with_cdn_url() -> anyhow::Result<()> {
        let uploader = ImageUploader::new(
            MemoryStore::new(),
            RepoCoordinates::new("alice", "blog", "main"),
            HexoLayout::default(),
        );
        let now = DateTime::from_timestamp_millis(1_709_285_400_123).unwrap();

        let image = uploader.upload_at(&[0x89, b'P', b'N', b'G'], "my cat.png", now).await?;
        assert_eq!(image.path, "source/assets/1709285400123-my-cat.png");
        assert_eq!(
            image.url,
            "https://cdn.jsdelivr.net/gh/alice/blog@main/source/assets/1709285400123-my-cat.png"
        );
        assert_eq!(
            image.markdown("A cat"),
            "![A cat](https://cdn.jsdelivr.net/gh/alice/blog@main/source/assets/1709285400123-my-cat.png)"
        );

        let result = uploader.upload_at(&[1], "my cat.png", now).await;
        assert!(matches!(result, Err(ImageError::Store(StoreError::Conflict { .. }))));

        Ok(())
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let uploader = ImageUploader::new(
            MemoryStore::new(),
            RepoCoordinates::new("alice", "blog", "main"),
            HexoLayout::default(),
        );
        let result = uploader.upload(&[], "x.png").await;
        assert!(matches!(result, Err(ImageError::Empty)));
    }
}
