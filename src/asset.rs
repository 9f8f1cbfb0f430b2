// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Site-wide assets.
//!
//! Besides posts, a Hexo site carries a handful of files that apply to every
//! page: the favicon, a custom stylesheet and script that themes pick up as
//! `/custom.css` and `/custom.js`, and web fonts. All of them live directly in
//! the source directory, so Hexo copies them to the site root unchanged.
//!
//! ```text
//! source/
//! ├── favicon.ico
//! ├── custom.css
//! ├── custom.js
//! └── fonts/
//!     └── Inter.woff2
//! ```
//!
//! Uploading a favicon also points the `favicon:` and `apple_touch_icon:`
//! keys of the theme configuration at it. Applying a font writes an
//! `@font-face` rule into the custom stylesheet, headed by a marker comment so
//! applying the same font again replaces its rule instead of piling up
//! copies.

use crate::{
    config::HexoLayout,
    image::sanitize_filename,
    snapshot::{SiteConfigEditor, SnapshotError},
    store::{self, FileStore, StoreError, WriteReceipt},
};

use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// File extensions accepted as favicon.
pub const FAVICON_EXTENSIONS: [&str; 6] = ["ico", "png", "svg", "webp", "jpg", "jpeg"];

/// File extensions accepted as web font.
pub const FONT_EXTENSIONS: [&str; 4] = ["ttf", "woff", "woff2", "otf"];

/// Directory of web fonts, relative to the source directory.
pub const FONTS_DIR: &str = "fonts";

const FAVICON_KEYS: [&str; 2] = ["favicon", "apple_touch_icon"];

/// Custom code file themes load on every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomCode {
    /// `custom.css`
    Css,

    /// `custom.js`
    Js,
}

impl CustomCode {
    /// File name inside the source directory.
    pub fn filename(self) -> &'static str {
        match self {
            Self::Css => "custom.css",
            Self::Js => "custom.js",
        }
    }

    fn message(self, exists: bool) -> &'static str {
        match (self, exists) {
            (Self::Css, true) => "style: update custom CSS",
            (Self::Css, false) => "style: add custom CSS",
            (Self::Js, true) => "feat: update custom JS",
            (Self::Js, false) => "feat: add custom JS",
        }
    }
}

impl FromStr for CustomCode {
    type Err = AssetError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.to_ascii_lowercase().as_str() {
            "css" => Ok(Self::Css),
            "js" => Ok(Self::Js),
            other => Err(AssetError::UnknownCustomCode(other.into())),
        }
    }
}

/// Current content of a custom code file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCodeFile {
    pub kind: CustomCode,
    pub path: String,

    /// Content, empty if the file does not exist yet.
    pub content: String,

    /// Revision token, `None` if the file does not exist yet.
    pub sha: Option<String>,
}

/// Favicon after upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favicon {
    /// Store path of the icon.
    pub path: String,

    /// Site URL of the icon, e.g., `/favicon.png`.
    pub url: String,

    /// Theme configuration that now points at the icon, if any was changed.
    pub synced_config: Option<String>,
}

/// Web font stored in the fonts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebFont {
    pub path: String,
    pub filename: String,
    pub sha: String,
}

impl WebFont {
    /// Font family name, the file name without extension.
    pub fn family(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map_or(self.filename.as_str(), |(stem, _)| stem)
    }

    /// CSS `format()` hint of the font file.
    pub fn format(&self) -> &str {
        match extension(&self.filename).as_deref() {
            Some("woff2") => "woff2",
            Some("woff") => "woff",
            Some("otf") => "opentype",
            _ => "truetype",
        }
    }

    /// Site URL the font is served from.
    pub fn url(&self) -> String {
        format!("/{FONTS_DIR}/{}", self.filename)
    }

    /// `@font-face` rule that loads the font.
    pub fn font_face(&self) -> String {
        format!(
            "@font-face {{\n  font-family: '{}';\n  src: url('{}') format('{}');\n  font-display: swap;\n}}",
            self.family(),
            self.url(),
            self.format()
        )
    }

    fn marker(&self) -> String {
        format!("/* font-family: '{}' */", self.family())
    }
}

/// Manage favicon, custom code, and web fonts of site.
#[derive(Debug, Clone)]
pub struct SiteAssets<S>
where
    S: FileStore,
{
    store: S,
    layout: HexoLayout,
    editor: SiteConfigEditor<S>,
}

impl<S> SiteAssets<S>
where
    S: FileStore,
{
    /// Construct new asset manager.
    ///
    /// Theme configuration changes go through `editor`, so they are covered
    /// by configuration snapshots like any other configuration edit.
    pub fn new(store: S, layout: HexoLayout, editor: SiteConfigEditor<S>) -> Self {
        Self {
            store,
            layout,
            editor,
        }
    }

    /// Upload favicon, replacing any previous one with the same extension.
    ///
    /// The icon lands at `favicon.{ext}` in the source directory. Afterwards
    /// the theme configuration is pointed at it, see
    /// [`SiteAssets::sync_favicon`].
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Empty`] if there is nothing to upload.
    /// - Return [`AssetError::UnsupportedFormat`] if the file extension is not
    ///   one of [`FAVICON_EXTENSIONS`].
    /// - Return [`AssetError::Store`] if the upload fails.
    /// - Return [`AssetError::Config`] if the theme configuration cannot be
    ///   updated. The icon is uploaded already in that case.
    #[instrument(skip(self, bytes), level = "debug")]
    pub async fn upload_favicon(&self, bytes: &[u8], filename: &str) -> Result<Favicon> {
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }

        let ext = extension(filename).unwrap_or_else(|| "ico".into());
        if !FAVICON_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AssetError::UnsupportedFormat { filename: filename.into() });
        }

        let name = format!("favicon.{ext}");
        let path = self.layout.source_path(&name);
        self.store
            .upsert(&path, bytes, "chore: update favicon")
            .await?;
        info!("uploaded favicon to {path:?}");

        let url = format!("/{name}");
        let synced_config = self.sync_favicon(&url).await?;

        Ok(Favicon {
            path,
            url,
            synced_config,
        })
    }

    /// Point favicon keys of theme configuration at given site URL.
    ///
    /// Only keys that already carry a value are rewritten. Returns the path of
    /// the theme configuration if it changed.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Config`] if configuration cannot be loaded or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync_favicon(&self, url: &str) -> Result<Option<String>> {
        let files = match self.editor.load().await {
            Ok(files) => files,
            Err(SnapshotError::Store(StoreError::NotFound { path })) => {
                debug!("no site configuration at {path:?}, nothing to point at {url:?}");
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };
        let Some(theme) = &files.theme else {
            debug!("no theme configuration to point at {url:?}");
            return Ok(None);
        };

        let updated = FAVICON_KEYS
            .iter()
            .fold(theme.file.content.clone(), |yaml, key| {
                replace_top_level_value(&yaml, key, url)
            });
        if updated == theme.file.content {
            debug!("{:?} has no favicon keys to update", theme.path);
            return Ok(None);
        }

        self.editor
            .save_theme_with_message(&files, &updated, &format!("chore: update favicon to {url}"))
            .await?;
        info!("pointed favicon of {:?} at {url:?}", theme.path);

        Ok(Some(theme.path.clone()))
    }

    /// Load custom code file, empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Store`] if the read fails for any other reason
    ///   than the file being absent.
    pub async fn load_custom(&self, kind: CustomCode) -> Result<CustomCodeFile> {
        let path = self.layout.source_path(kind.filename());
        let (content, sha) = match self.store.read(&path).await {
            Ok(file) => (file.content, Some(file.sha)),
            Err(StoreError::NotFound { .. }) => (String::new(), None),
            Err(error) => return Err(error.into()),
        };

        Ok(CustomCodeFile {
            kind,
            path,
            content,
            sha,
        })
    }

    /// Save custom code file.
    ///
    /// Creates the file when `expected_sha` is `None`, updates it otherwise.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Store`] with [`StoreError::Conflict`] if the
    ///   file changed since `expected_sha`, or appeared since it was found
    ///   absent.
    #[instrument(skip(self, content, expected_sha), level = "debug")]
    pub async fn save_custom(
        &self,
        kind: CustomCode,
        content: &str,
        expected_sha: Option<&str>,
    ) -> Result<WriteReceipt> {
        let path = self.layout.source_path(kind.filename());
        let receipt = self
            .store
            .write(
                &path,
                content.as_bytes(),
                expected_sha,
                kind.message(expected_sha.is_some()),
            )
            .await?;
        info!("saved {path:?}");

        Ok(receipt)
    }

    /// List web fonts, sorted by file name.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Store`] if the listing fails.
    pub async fn list_fonts(&self) -> Result<Vec<WebFont>> {
        let mut fonts = self
            .store
            .list(&self.layout.source_path(FONTS_DIR))
            .await?
            .into_iter()
            .filter(|entry| entry.is_file() && is_font(&entry.name))
            .map(|entry| WebFont {
                path: entry.path,
                filename: entry.name,
                sha: entry.sha,
            })
            .collect::<Vec<_>>();
        fonts.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(fonts)
    }

    /// Upload web font into fonts directory, replacing one of the same name.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Empty`] if there is nothing to upload.
    /// - Return [`AssetError::UnsupportedFormat`] if the file extension is not
    ///   one of [`FONT_EXTENSIONS`].
    /// - Return [`AssetError::Store`] if the upload fails.
    #[instrument(skip(self, bytes), level = "debug")]
    pub async fn upload_font(&self, bytes: &[u8], filename: &str) -> Result<WebFont> {
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }

        let filename = sanitize_filename(filename);
        if !is_font(&filename) {
            return Err(AssetError::UnsupportedFormat { filename });
        }

        let path = self.layout.source_path(&format!("{FONTS_DIR}/{filename}"));
        let receipt = self
            .store
            .upsert(&path, bytes, &format!("feat: upload font {filename}"))
            .await?;
        info!("uploaded {} bytes to {path:?}", bytes.len());

        Ok(WebFont {
            path: receipt.path,
            filename,
            sha: receipt.sha,
        })
    }

    /// Apply web font to the site through the custom stylesheet.
    ///
    /// Drops any rule an earlier application of the same family left behind,
    /// then appends a fresh one.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Store`] if the stylesheet cannot be read or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub async fn apply_font(&self, font: &WebFont) -> Result<WriteReceipt> {
        let current = self.load_custom(CustomCode::Css).await?;
        let content = with_font_rule(&current.content, font);
        let family = font.family();
        let message = match current.sha {
            Some(_) => format!("style: apply font {family} to blog"),
            None => format!("style: add custom font {family}"),
        };

        let receipt = self
            .store
            .write(
                &current.path,
                content.as_bytes(),
                current.sha.as_deref(),
                &message,
            )
            .await?;
        info!("applied font {family:?} through {:?}", current.path);

        Ok(receipt)
    }

    /// Remove web font.
    ///
    /// The rule applying it, if any, stays in the custom stylesheet.
    ///
    /// # Errors
    ///
    /// - Return [`AssetError::Store`] with [`StoreError::Conflict`] if the
    ///   font changed since it was listed.
    pub async fn remove_font(&self, font: &WebFont) -> Result<()> {
        self.store
            .remove(
                &font.path,
                &font.sha,
                &format!("chore: remove font {}", font.filename),
            )
            .await?;
        warn!("removed {:?}, rules using it may still be around", font.path);

        Ok(())
    }
}

/// Replace value of first top-level `key:` line that has an inline value.
pub fn replace_top_level_value(yaml: &str, key: &str, value: &str) -> String {
    let prefix = format!("{key}:");
    let mut replaced = false;
    let mut out = String::with_capacity(yaml.len() + value.len());

    for line in yaml.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        let rest = body.strip_prefix(&prefix);
        match rest {
            Some(rest) if !replaced && rest.starts_with([' ', '\t']) && !rest.trim().is_empty() => {
                let gap = &rest[..rest.len() - rest.trim_start().len()];
                out.push_str(&prefix);
                out.push_str(gap);
                out.push_str(value);
                out.push_str(ending);
                replaced = true;
            }
            _ => out.push_str(line),
        }
    }

    out
}

/// Stylesheet with the rule of font appended, and older rules of its family
/// removed.
pub fn with_font_rule(css: &str, font: &WebFont) -> String {
    let marker = font.marker();
    let mut cleaned = String::with_capacity(css.len());
    let mut rest = css;

    while let Some(start) = rest.find(&marker) {
        cleaned.push_str(&rest[..start]);
        let after = &rest[start..];
        rest = match after.find('}') {
            Some(end) => after[end + 1..].trim_start(),
            None => "",
        };
    }
    cleaned.push_str(rest);

    let cleaned = cleaned.trim_end();
    let mut css = String::with_capacity(cleaned.len() + 160);
    if !cleaned.is_empty() {
        css.push_str(cleaned);
        css.push_str("\n\n");
    }
    css.push_str(&marker);
    css.push('\n');
    css.push_str(&font.font_face());
    css.push('\n');

    css
}

fn extension(filename: &str) -> Option<String> {
    store::file_name(filename)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn is_font(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.as_str()))
}

/// Site asset error types.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Nothing to upload.
    #[error("file is empty")]
    Empty,

    /// Custom code kind is neither `css` nor `js`.
    #[error("unknown custom code {0:?}, expected css or js")]
    UnknownCustomCode(String),

    /// File type is not accepted for this asset.
    #[error("unsupported file format {filename:?}")]
    UnsupportedFormat { filename: String },

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Theme configuration could not be updated.
    #[error(transparent)]
    Config(#[from] SnapshotError),
}

/// Friendly result alias :3
pub type Result<T, E = AssetError> = std::result::Result<T, E>;
