// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote file store access.
//!
//! Hexcms has no server and no database of its own. Every save is a commit to
//! a path-addressed, versioned file store, i.e., a GitHub repository reached
//! through its contents API. This module defines the contract that the rest of
//! the crate programs against.
//!
//! # Revision Tokens
//!
//! Every stored file carries an opaque __revision token__ (a blob SHA on
//! GitHub). Updating or removing a file requires the token of the version the
//! caller last saw. If the store holds a different version, the write fails
//! with [`StoreError::Conflict`], and nothing is modified. This is plain
//! compare-and-swap. The client never merges and never retries.
//!
//! # Moving Files
//!
//! The store has no rename primitive. A move is a create at the new path
//! followed by a delete of the old path, and is __not__ atomic:
//!
//! - If the create fails, nothing changed.
//! - If the delete fails after the create succeeded, the file exists at both
//!   paths until someone cleans it up by hand.
//!
//! Callers must surface the second case to the user rather than hide it.

pub mod github;
pub mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Content and revision token of a stored text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Decoded UTF-8 content.
    pub content: String,

    /// Revision token of this version.
    pub sha: String,
}

/// Kind of entry found in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// Single entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirEntry {
    /// Base name of entry.
    pub name: String,

    /// Store-relative path of entry.
    pub path: String,

    /// Revision token of entry.
    pub sha: String,

    /// Size in bytes, zero for directories.
    #[serde(default)]
    pub size: u64,

    /// What kind of entry this is.
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Raw download location, if the store offers one.
    #[serde(default)]
    pub download_url: Option<String>,
}

impl DirEntry {
    /// Check if entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Path the store recorded the file under.
    pub path: String,

    /// Fresh revision token of the written version.
    pub sha: String,
}

/// Capability-style access to a path-addressed, versioned file store.
///
/// Every mutating call takes a commit message. Implementations must refuse
/// writes and removals whose expected revision token differs from the stored
/// one.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Read text file at path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if nothing exists at path.
    /// - Return [`StoreError::NotAFile`] if path denotes a directory.
    async fn read(&self, path: &str) -> Result<RemoteFile>;

    /// List entries of directory at path.
    ///
    /// A missing directory yields an empty listing, never an error. Callers
    /// cannot, and must not try to, tell "empty" apart from "absent".
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Write content to path.
    ///
    /// Creates the file when `expected_sha` is `None`, updates it otherwise.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Conflict`] if the stored revision token differs
    ///   from `expected_sha`, or if a create targets an existing file.
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected_sha: Option<&str>,
        message: &str,
    ) -> Result<WriteReceipt>;

    /// Remove file at path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if nothing exists at path.
    /// - Return [`StoreError::Conflict`] if the stored revision token differs
    ///   from `expected_sha`.
    async fn remove(&self, path: &str, expected_sha: &str, message: &str) -> Result<()>;

    /// Write content to new path, then remove old path.
    ///
    /// Non-atomic. See the module documentation for the failure window.
    #[instrument(skip(self, content, expected_sha, message), level = "debug")]
    async fn relocate(
        &self,
        old_path: &str,
        new_path: &str,
        content: &[u8],
        expected_sha: &str,
        message: &str,
    ) -> Result<WriteReceipt> {
        let receipt = self.write(new_path, content, None, message).await?;
        if let Err(error) = self.remove(old_path, expected_sha, message).await {
            warn!(
                "{old_path:?} was copied to {new_path:?} but could not be removed, \
                 file now exists at both paths"
            );
            return Err(error);
        }

        Ok(receipt)
    }

    /// Move file from old path to new path, keeping its content.
    ///
    /// Non-atomic. See the module documentation for the failure window.
    async fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
        expected_sha: &str,
        message: Option<&str>,
    ) -> Result<WriteReceipt> {
        let file = self.read(old_path).await?;
        let message = message
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("chore: move {old_path} → {new_path}"));
        self.relocate(
            old_path,
            new_path,
            file.content.as_bytes(),
            expected_sha,
            &message,
        )
        .await
    }

    /// Create or replace file at path without knowing its revision token.
    ///
    /// Looks the current token up through a listing of the parent directory,
    /// so an absent file never shows up as a failed read.
    async fn upsert(&self, path: &str, content: &[u8], message: &str) -> Result<WriteReceipt> {
        let (parent, name) = split_parent(path);
        let existing = self
            .list(parent)
            .await?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.sha);
        self.write(path, content, existing.as_deref(), message).await
    }
}

#[async_trait]
impl<S> FileStore for Arc<S>
where
    S: FileStore + ?Sized,
{
    async fn read(&self, path: &str) -> Result<RemoteFile> {
        (**self).read(path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        (**self).list(path).await
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected_sha: Option<&str>,
        message: &str,
    ) -> Result<WriteReceipt> {
        (**self).write(path, content, expected_sha, message).await
    }

    async fn remove(&self, path: &str, expected_sha: &str, message: &str) -> Result<()> {
        (**self).remove(path, expected_sha, message).await
    }
}

/// Split store path into parent directory and base name.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

/// Base name of store path.
pub fn file_name(path: &str) -> &str {
    split_parent(path).1
}

/// All possible error types for file store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing exists at path.
    #[error("no file at {path:?}")]
    NotFound { path: String },

    /// Path denotes a directory or other non-file entry.
    #[error("{path:?} is not a file")]
    NotAFile { path: String },

    /// Stored revision token differs from the expected one.
    #[error("{path:?} was changed by someone else, reload it and try again")]
    Conflict { path: String },

    /// Credential was rejected.
    #[error("access token was rejected by the store")]
    Unauthorized,

    /// Store is throttling this client.
    #[error("rate limited by the store")]
    RateLimited,

    /// Store failed on its end.
    #[error("store is unavailable (status {status})")]
    Unavailable { status: u16 },

    /// Request never completed.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Store answered with an unexpected status.
    #[error("store rejected request with status {status}: {message}")]
    Api { status: u16, message: String },

    /// File content could not be decoded from its transfer encoding.
    #[error(transparent)]
    Decode(#[from] base64::DecodeError),

    /// File content is not valid UTF-8.
    #[error("{path:?} does not contain UTF-8 text")]
    NotText {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl StoreError {
    /// Check if error is a transient network condition worth retrying by hand.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Unavailable { .. } | Self::Transport(_)
        )
    }

    /// Check if error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is a revision token conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
