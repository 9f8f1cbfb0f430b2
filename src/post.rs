// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Post lifecycle management.
//!
//! Hexo keeps drafts and published posts in two separate directories. Hexcms
//! mirrors that: a post is a draft if and only if it lives in the drafts
//! directory, and its `draft` frontmatter flag always agrees with that. Any
//! change of draft state therefore moves the file, which inherits the
//! non-atomic move semantics of the [`store`](crate::store).
//!
//! Every operation here is a read-modify-write against the store. The manager
//! holds no state of its own beyond the store handle and the layout, and it
//! never retries. Conflicts and missing files go back to the caller as is.

use crate::{
    codec::{self, Frontmatter},
    config::HexoLayout,
    store::{self, FileStore, RemoteFile, StoreError},
};

use chrono::{DateTime, FixedOffset, Local};
use futures::future::try_join_all;
use glob::Pattern;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Which posts a listing should include.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Published,
    Draft,
    #[default]
    All,
}

impl PostStatus {
    fn includes(self, is_draft: bool) -> bool {
        match self {
            Self::Published => !is_draft,
            Self::Draft => is_draft,
            Self::All => true,
        }
    }
}

impl FromStr for PostStatus {
    type Err = PostError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.to_ascii_lowercase().as_str() {
            "published" => Ok(Self::Published),
            "draft" | "drafts" => Ok(Self::Draft),
            "all" => Ok(Self::All),
            other => Err(PostError::Invalid(format!(
                "unknown post status {other:?}, expected published, draft, or all"
            ))),
        }
    }
}

impl Display for PostStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::All => "all",
        })
    }
}

/// Fully loaded post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Store path, e.g., `source/_posts/2024-03-01-hello-world.md`.
    pub path: String,

    /// Revision token, required for update and delete.
    pub sha: String,

    /// File name without directory.
    pub filename: String,

    /// Explicit slug, or slug derived from file name.
    pub slug: String,

    pub frontmatter: Frontmatter,

    /// Markdown body without frontmatter.
    pub body: String,

    /// Full text including frontmatter.
    pub raw: String,

    /// Whether post lives in the drafts directory.
    pub is_draft: bool,

    pub created_at: DateTime<FixedOffset>,

    pub updated_at: Option<String>,
}

impl Post {
    /// Title of post.
    pub fn title(&self) -> &str {
        &self.frontmatter.title
    }
}

/// Lightweight view of a post for listings, without body.
#[derive(Debug, Clone, PartialEq)]
pub struct PostListEntry {
    pub path: String,
    pub sha: String,
    pub filename: String,
    pub slug: String,
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub is_draft: bool,
    pub description: Option<String>,
}

/// Caller input for a new post.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub draft: bool,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub slug: Option<String>,
}

impl PostInput {
    /// Construct new input with title and body, everything else default.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Initial frontmatter of post created at given time.
    pub fn to_frontmatter(&self, now: DateTime<FixedOffset>) -> Frontmatter {
        Frontmatter {
            title: self.title.clone(),
            date: Some(codec::format_timestamp(&now)),
            tags: self.tags.clone(),
            categories: self.categories.clone(),
            draft: Some(self.draft),
            description: non_empty(self.description.clone()),
            cover: non_empty(self.cover.clone()),
            slug: non_empty(self.slug.clone()),
            ..Frontmatter::default()
        }
    }
}

/// Caller changes to an existing post.
///
/// `None` keeps the stored value. `Some` replaces it. For optional text
/// fields, `Some` of an empty string removes the field altogether.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub draft: Option<bool>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub slug: Option<String>,
}

impl PostUpdate {
    /// Update that only changes draft state.
    pub fn draft(draft: bool) -> Self {
        Self {
            draft: Some(draft),
            ..Self::default()
        }
    }

    fn apply(self, frontmatter: &mut Frontmatter, body: &mut String) {
        if let Some(title) = self.title {
            frontmatter.title = title;
        }
        if let Some(new_body) = self.body {
            *body = new_body;
        }
        if let Some(tags) = self.tags {
            frontmatter.tags = tags;
        }
        if let Some(categories) = self.categories {
            frontmatter.categories = categories;
        }
        if let Some(description) = self.description {
            frontmatter.description = non_empty(Some(description));
        }
        if let Some(cover) = self.cover {
            frontmatter.cover = non_empty(Some(cover));
        }
        if let Some(slug) = self.slug {
            frontmatter.slug = non_empty(Some(slug));
        }
    }
}

/// Post lifecycle manager.
///
/// Implements create, update, publish, unpublish, delete, and listing on top
/// of a [`FileStore`].
#[derive(Debug, Clone)]
pub struct PostManager<S>
where
    S: FileStore,
{
    store: S,
    layout: HexoLayout,
    is_markdown: Pattern,
}

impl<S> PostManager<S>
where
    S: FileStore,
{
    /// Construct new post manager.
    pub fn new(store: S, layout: HexoLayout) -> Self {
        Self {
            store,
            layout,
            // INVARIANT: Literal pattern, always compiles.
            is_markdown: Pattern::new("*.md").unwrap_or_default(),
        }
    }

    /// Layout that decides where drafts and posts live.
    pub fn layout(&self) -> &HexoLayout {
        &self.layout
    }

    /// Borrow underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// List posts, newest first.
    ///
    /// Reads the frontmatter of every Markdown file in the relevant
    /// directories. Missing directories count as empty. A file whose
    /// frontmatter cannot be parsed or whose content cannot be read is still
    /// listed, titled by its slug. A file that vanished between listing and
    /// reading is skipped.
    ///
    /// # Errors
    ///
    /// - Return [`PostError::Store`] if a listing fails, or if reading a file
    ///   fails for a transient or authorization reason.
    #[instrument(skip(self), level = "debug")]
    pub async fn list(&self, status: PostStatus) -> Result<Vec<PostListEntry>> {
        let mut entries = Vec::new();
        for is_draft in [false, true] {
            if !status.includes(is_draft) {
                continue;
            }

            let dir = self.layout.post_dir(is_draft);
            let files = self
                .store
                .list(dir)
                .await?
                .into_iter()
                .filter(|entry| entry.is_file() && self.is_markdown.matches(&entry.name))
                .collect::<Vec<_>>();
            debug!("{} posts under {dir:?}", files.len());

            let loaded = try_join_all(
                files
                    .iter()
                    .map(|entry| self.list_entry(&entry.path, &entry.sha, is_draft)),
            )
            .await?;
            entries.extend(loaded.into_iter().flatten());
        }

        entries.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(entries)
    }

    /// Load single post with body.
    ///
    /// # Errors
    ///
    /// - Return [`PostError::Store`] with [`StoreError::NotFound`] if no post
    ///   exists at path.
    /// - Return [`PostError::Codec`] if frontmatter cannot be parsed.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, path: &str) -> Result<Post> {
        let RemoteFile { content, sha } = self.store.read(path).await?;
        self.to_post(content, sha, path.into())
    }

    /// Create new post.
    pub async fn create(&self, input: PostInput) -> Result<Post> {
        self.create_at(input, Local::now().fixed_offset()).await
    }

    /// Create new post as if it were created at given time.
    ///
    /// The post lands in the drafts or posts directory according to
    /// `input.draft`, under a file name derived from title and date.
    ///
    /// # Errors
    ///
    /// - Return [`PostError::Invalid`] if title is blank or has no letters
    ///   or digits. Nothing is written.
    /// - Return [`PostError::Store`] with [`StoreError::Conflict`] if a file
    ///   already exists at the derived path.
    #[instrument(skip(self, input), fields(title = %input.title), level = "debug")]
    pub async fn create_at(&self, input: PostInput, now: DateTime<FixedOffset>) -> Result<Post> {
        validate_title(&input.title)?;

        let path = codec::post_path(&self.layout, &input.title, input.draft, now.date_naive());
        let frontmatter = input.to_frontmatter(now);
        let content = codec::encode(&frontmatter, &input.body)?;
        let receipt = self
            .store
            .write(
                &path,
                content.as_bytes(),
                None,
                &format!("feat: create post \"{}\"", input.title),
            )
            .await?;
        info!("created {path:?}");

        self.to_post(content, receipt.sha, path)
    }

    /// Update existing post.
    ///
    /// Merges caller changes over stored frontmatter, keeping every key the
    /// caller did not touch, including keys hexcms does not know. If the
    /// draft state changes, the post moves to the other directory, and the
    /// returned post carries the new path. Callers holding on to the old
    /// path must switch to the new one.
    ///
    /// # Errors
    ///
    /// - Return [`PostError::Invalid`] if a new title is blank.
    /// - Return [`PostError::Store`] with [`StoreError::Conflict`] if
    ///   `expected_sha` is stale. Nothing is written in that case.
    /// - Return [`PostError::Store`] with [`StoreError::NotFound`] if no post
    ///   exists at path.
    #[instrument(skip(self, changes, expected_sha), level = "debug")]
    pub async fn update(&self, path: &str, changes: PostUpdate, expected_sha: &str) -> Result<Post> {
        if let Some(title) = &changes.title {
            validate_title(title)?;
        }

        let current = self.store.read(path).await?;

        // INVARIANT: Refuse stale tokens before writing anything.
        //   - A move writes the new path before touching the old one, so the
        //     store's own check on removal would come too late.
        if current.sha != expected_sha {
            return Err(StoreError::Conflict { path: path.into() }.into());
        }

        let (mut frontmatter, mut body) = codec::decode(&current.content)?;
        let was_draft = self.layout.is_draft_path(path);
        let is_draft = changes.draft.unwrap_or(was_draft);
        changes.apply(&mut frontmatter, &mut body);
        frontmatter.draft = Some(is_draft);

        let content = codec::encode(&frontmatter, &body)?;
        let title = frontmatter.title.clone();

        if was_draft == is_draft {
            let receipt = self
                .store
                .write(
                    path,
                    content.as_bytes(),
                    Some(expected_sha),
                    &format!("chore: update post \"{title}\""),
                )
                .await?;
            info!("updated {path:?}");
            return self.to_post(content, receipt.sha, path.into());
        }

        let new_path = format!(
            "{}/{}",
            self.layout.post_dir(is_draft).trim_end_matches('/'),
            store::file_name(path)
        );
        let message = if is_draft {
            format!("chore: unpublish \"{title}\"")
        } else {
            format!("feat: publish \"{title}\"")
        };
        let receipt = self
            .store
            .relocate(path, &new_path, content.as_bytes(), expected_sha, &message)
            .await?;
        info!("moved {path:?} to {new_path:?}");

        self.to_post(content, receipt.sha, new_path)
    }

    /// Publish draft.
    ///
    /// Publishing a post that is already published changes nothing, and only
    /// logs a warning.
    ///
    /// # Errors
    ///
    /// - Same as [`PostManager::update`].
    pub async fn publish(&self, path: &str, expected_sha: &str) -> Result<Post> {
        if !self.layout.is_draft_path(path) {
            warn!("{path:?} is already published");
            return self.get(path).await;
        }

        self.update(path, PostUpdate::draft(false), expected_sha).await
    }

    /// Turn published post back into draft.
    ///
    /// Unpublishing a draft changes nothing, and only logs a warning.
    ///
    /// # Errors
    ///
    /// - Same as [`PostManager::update`].
    pub async fn unpublish(&self, path: &str, expected_sha: &str) -> Result<Post> {
        if self.layout.is_draft_path(path) {
            warn!("{path:?} is already a draft");
            return self.get(path).await;
        }

        self.update(path, PostUpdate::draft(true), expected_sha).await
    }

    /// Delete post.
    ///
    /// There is no undo beyond the store's own history.
    ///
    /// # Errors
    ///
    /// - Return [`PostError::Store`] with [`StoreError::Conflict`] if
    ///   `expected_sha` is stale.
    #[instrument(skip(self, expected_sha), level = "debug")]
    pub async fn delete(&self, path: &str, expected_sha: &str) -> Result<()> {
        self.store
            .remove(path, expected_sha, &format!("chore: delete post at {path}"))
            .await?;
        info!("deleted {path:?}");

        Ok(())
    }

    async fn list_entry(
        &self,
        path: &str,
        sha: &str,
        is_draft: bool,
    ) -> Result<Option<PostListEntry>> {
        let filename = store::file_name(path).to_string();
        let frontmatter = match self.store.read(path).await {
            Ok(file) => match codec::decode(&file.content) {
                Ok((frontmatter, _)) => frontmatter,
                Err(error) => {
                    warn!("cannot parse frontmatter of {path:?}: {error}");
                    Frontmatter::default()
                }
            },
            Err(error) if error.is_not_found() => {
                warn!("{path:?} vanished while listing, skipping it");
                return Ok(None);
            }
            Err(error) if error.is_transient() || matches!(error, StoreError::Unauthorized) => {
                return Err(error.into());
            }
            Err(error) => {
                warn!("cannot read {path:?}, listing it by file name: {error}");
                Frontmatter::default()
            }
        };

        let slug = frontmatter
            .slug
            .clone()
            .unwrap_or_else(|| codec::slug_from_filename(&filename));
        let date = codec::resolve_date(&frontmatter, &filename, Local::now().fixed_offset());
        let title = if frontmatter.title.trim().is_empty() {
            slug.clone()
        } else {
            frontmatter.title
        };

        Ok(Some(PostListEntry {
            path: path.into(),
            sha: sha.into(),
            filename,
            slug,
            title,
            date,
            tags: frontmatter.tags,
            categories: frontmatter.categories,
            is_draft,
            description: frontmatter.description,
        }))
    }

    fn to_post(&self, raw: String, sha: String, path: String) -> Result<Post> {
        let (frontmatter, body) = codec::decode(&raw)?;
        let filename = store::file_name(&path).to_string();
        let is_draft = self.layout.is_draft_path(&path);
        if frontmatter.draft.is_some_and(|draft| draft != is_draft) {
            debug!("draft flag of {path:?} disagrees with its directory, directory wins");
        }

        let slug = frontmatter
            .slug
            .clone()
            .unwrap_or_else(|| codec::slug_from_filename(&filename));
        let created_at = codec::resolve_date(&frontmatter, &filename, Local::now().fixed_offset());
        let updated_at = frontmatter.updated.clone();

        Ok(Post {
            path,
            sha,
            filename,
            slug,
            frontmatter,
            body,
            raw,
            is_draft,
            created_at,
            updated_at,
        })
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PostError::Invalid("title must not be empty".into()));
    }

    if codec::slugify(title).is_empty() {
        return Err(PostError::Invalid(format!(
            "title {title:?} needs at least one letter or digit"
        )));
    }

    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Post lifecycle error types.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// Caller input rejected before any store call.
    #[error("invalid post: {0}")]
    Invalid(String),

    /// Post text could not be decoded or encoded.
    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

impl PostError {
    /// Check if error is a revision token conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_conflict())
    }

    /// Check if error means the post does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_not_found())
    }
}

/// Friendly result alias :3
pub type Result<T, E = PostError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{memory::Fault, MemoryStore};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn march_first() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T09:30:00+00:00").unwrap()
    }

    fn manager() -> PostManager<MemoryStore> {
        PostManager::new(MemoryStore::new(), HexoLayout::default())
    }

    #[test_case("published", PostStatus::Published; "published")]
    #[test_case("Drafts", PostStatus::Draft; "plural drafts")]
    #[test_case("ALL", PostStatus::All; "all")]
    #[test]
    fn parse_post_status(text: &str, expect: PostStatus) {
        pretty_assertions::assert_eq!(text.parse::<PostStatus>().unwrap(), expect);
    }

    #[test]
    fn initial_frontmatter_drops_blank_optionals() {
        let input = PostInput {
            description: Some("  ".into()),
            cover: Some("https://example.com/c.png".into()),
            ..PostInput::new("Hello", "")
        };
        let frontmatter = input.to_frontmatter(march_first());
        assert_eq!(frontmatter.date.as_deref(), Some("2024-03-01T09:30:00+00:00"));
        assert_eq!(frontmatter.draft, Some(false));
        assert_eq!(frontmatter.description, None);
        assert_eq!(frontmatter.cover.as_deref(), Some("https://example.com/c.png"));
    }

    #[tokio::test]
    async fn create_rejects_blank_title_without_writing() {
        let manager = manager();
        for title in ["", "   ", "???"] {
            let result = manager.create_at(PostInput::new(title, "body"), march_first()).await;
            assert!(matches!(result, Err(PostError::Invalid(_))));
        }
        assert!(manager.store().paths().is_empty());
    }

    #[tokio::test]
    async fn create_same_title_same_day_conflicts() -> anyhow::Result<()> {
        let manager = manager();
        manager.create_at(PostInput::new("Twice", "a"), march_first()).await?;
        let result = manager.create_at(PostInput::new("Twice", "b"), march_first()).await;
        assert!(matches!(result, Err(ref error) if error.is_conflict()));
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() -> anyhow::Result<()> {
        let manager = manager();
        let input = PostInput {
            tags: vec!["rust".into()],
            description: Some("About things".into()),
            ..PostInput::new("Keep Me", "original body")
        };
        let post = manager.create_at(input, march_first()).await?;

        let changes = PostUpdate {
            body: Some("new body".into()),
            cover: Some(String::new()),
            description: Some(String::new()),
            ..PostUpdate::default()
        };
        let updated = manager.update(&post.path, changes, &post.sha).await?;

        assert_eq!(updated.path, post.path);
        assert_ne!(updated.sha, post.sha);
        assert_eq!(updated.title(), "Keep Me");
        assert_eq!(updated.body, "new body");
        assert_eq!(updated.frontmatter.tags, vec!["rust".to_string()]);
        assert_eq!(updated.frontmatter.description, None);
        assert_eq!(updated.frontmatter.date, post.frontmatter.date);

        Ok(())
    }

    #[tokio::test]
    async fn update_preserves_unknown_keys() -> anyhow::Result<()> {
        let store = MemoryStore::with_files([(
            "source/_posts/2024-01-01-theme.md",
            "---\ntitle: Theme\nlayout: gallery\nphotos:\n- a.png\n---\n\nbody\n",
        )]);
        let manager = PostManager::new(store, HexoLayout::default());
        let post = manager.get("source/_posts/2024-01-01-theme.md").await?;

        let changes = PostUpdate {
            title: Some("Theme Renamed".into()),
            ..PostUpdate::default()
        };
        let updated = manager.update(&post.path, changes, &post.sha).await?;

        assert_eq!(updated.frontmatter.extra, post.frontmatter.extra);
        assert_eq!(updated.frontmatter.draft, Some(false));
        assert_eq!(updated.slug, "theme");

        Ok(())
    }

    #[tokio::test]
    async fn stale_token_never_moves() -> anyhow::Result<()> {
        let manager = manager();
        let post = manager
            .create_at(
                PostInput {
                    draft: true,
                    ..PostInput::new("Racy", "v1")
                },
                march_first(),
            )
            .await?;
        let fresh = manager
            .update(
                &post.path,
                PostUpdate {
                    body: Some("v2".into()),
                    ..PostUpdate::default()
                },
                &post.sha,
            )
            .await?;

        let result = manager.publish(&post.path, &post.sha).await;
        assert!(matches!(result, Err(ref error) if error.is_conflict()));
        assert_eq!(manager.store().paths(), vec![fresh.path.clone()]);
        assert_eq!(manager.get(&fresh.path).await?.body, "v2");

        Ok(())
    }

    #[tokio::test]
    async fn publish_published_post_is_noop() -> anyhow::Result<()> {
        let manager = manager();
        let post = manager.create_at(PostInput::new("Live", "x"), march_first()).await?;
        let commits = manager.store().commits().len();

        let again = manager.publish(&post.path, &post.sha).await?;
        assert_eq!(again.path, post.path);
        assert_eq!(again.sha, post.sha);
        assert_eq!(manager.store().commits().len(), commits);

        Ok(())
    }

    #[tokio::test]
    async fn list_tolerates_broken_frontmatter() -> anyhow::Result<()> {
        let store = MemoryStore::with_files([
            ("source/_posts/2023-05-05-broken.md", "---\n: : :\n  - [\n---\nbody"),
            ("source/_posts/notes.txt", "not a post"),
        ]);
        let manager = PostManager::new(store, HexoLayout::default());

        let entries = manager.list(PostStatus::All).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "broken");
        assert_eq!(entries[0].date.to_rfc3339(), "2023-05-05T00:00:00+00:00");

        Ok(())
    }

    #[tokio::test]
    async fn list_survives_unreadable_file() -> anyhow::Result<()> {
        let store = MemoryStore::with_files([(
            "source/_posts/2024-01-10-fine.md",
            "---\ntitle: Fine\n---\n\nbody",
        )]);
        store
            .write("source/_posts/2024-01-02-latin1.md", b"---\n\xE9\n", None, "seed")
            .await?;
        let manager = PostManager::new(store, HexoLayout::default());

        let entries = manager.list(PostStatus::All).await?;
        let titles = entries.iter().map(|entry| entry.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Fine", "latin1"]);
        assert_eq!(entries[1].date.to_rfc3339(), "2024-01-02T00:00:00+00:00");

        manager.store().inject_fault(Fault::Read);
        let result = manager.list(PostStatus::All).await;
        assert!(matches!(result, Err(PostError::Store(ref error)) if error.is_transient()));

        Ok(())
    }

    #[tokio::test]
    async fn delete_requires_current_token() -> anyhow::Result<()> {
        let manager = manager();
        let post = manager.create_at(PostInput::new("Doomed", "x"), march_first()).await?;

        let result = manager.delete(&post.path, "0000").await;
        assert!(matches!(result, Err(ref error) if error.is_conflict()));

        manager.delete(&post.path, &post.sha).await?;
        let result = manager.get(&post.path).await;
        assert!(matches!(result, Err(ref error) if error.is_not_found()));

        Ok(())
    }
}
