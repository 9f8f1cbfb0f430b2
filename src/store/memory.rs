// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory file store.
//!
//! Keeps files in a sorted map, and hands out the same revision tokens Git
//! would, i.e., the SHA-1 of the blob header plus content. Directories exist
//! implicitly as long as some file lives beneath them. Useful for dry runs,
//! and for exercising the lifecycle manager without a network.

use crate::store::{
    split_parent, DirEntry, EntryKind, FileStore, RemoteFile, Result, StoreError, WriteReceipt,
};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, instrument};

/// Store operation that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Read,
    Write,
    Remove,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    commits: Vec<String>,
    faults: Vec<Fault>,
}

/// File store that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Construct new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct store pre-populated with text files.
    pub fn with_files(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for (path, content) in files {
                inner.files.insert(path.into(), content.into().into_bytes());
            }
        }
        store
    }

    /// Make the next call of given operation fail with a transient error.
    pub fn inject_fault(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }

    /// Paths of all stored files, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Raw text of stored file, if any.
    pub fn text(&self, path: &str) -> Option<String> {
        self.lock()
            .files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Commit messages recorded so far, oldest first.
    pub fn commits(&self) -> Vec<String> {
        self.lock().commits.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // INVARIANT: A poisoned lock still holds consistent data, every
        // mutation below is a single map operation.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn take_fault(&mut self, fault: Fault) -> Result<()> {
        if let Some(index) = self.faults.iter().position(|f| *f == fault) {
            self.faults.remove(index);
            return Err(StoreError::Unavailable { status: 503 });
        }

        Ok(())
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.files.keys().any(|key| key.starts_with(&prefix))
    }

    fn current_sha(&self, path: &str) -> Option<String> {
        self.files.get(path).map(|content| blob_sha(content))
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    #[instrument(skip(self), level = "debug")]
    async fn read(&self, path: &str) -> Result<RemoteFile> {
        let mut inner = self.lock();
        inner.take_fault(Fault::Read)?;

        match inner.files.get(path) {
            Some(bytes) => Ok(RemoteFile {
                content: String::from_utf8(bytes.clone()).map_err(|source| {
                    StoreError::NotText {
                        path: path.into(),
                        source,
                    }
                })?,
                sha: blob_sha(bytes),
            }),
            None if inner.is_dir(path) => Err(StoreError::NotAFile { path: path.into() }),
            None => Err(StoreError::NotFound { path: path.into() }),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let inner = self.lock();
        let dir = path.trim_end_matches('/');
        let mut subdirs = BTreeSet::new();
        let mut entries = Vec::new();

        for (key, content) in &inner.files {
            let Some(rest) = child_of(dir, key) else {
                continue;
            };

            match rest.split_once('/') {
                Some((subdir, _)) => {
                    subdirs.insert(subdir.to_string());
                }
                None => entries.push(DirEntry {
                    name: rest.into(),
                    path: key.clone(),
                    sha: blob_sha(content),
                    size: content.len() as u64,
                    kind: EntryKind::File,
                    download_url: None,
                }),
            }
        }

        for subdir in subdirs {
            let path = join(dir, &subdir);
            entries.push(DirEntry {
                name: subdir,
                sha: blob_sha(path.as_bytes()),
                path,
                size: 0,
                kind: EntryKind::Dir,
                download_url: None,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("{} entries under {dir:?}", entries.len());

        Ok(entries)
    }

    #[instrument(skip(self, content, expected_sha), level = "debug")]
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected_sha: Option<&str>,
        message: &str,
    ) -> Result<WriteReceipt> {
        let mut inner = self.lock();
        inner.take_fault(Fault::Write)?;

        // INVARIANT: Compare-and-swap on revision token.
        //   - Create requires absence.
        //   - Update requires the stored token to match.
        let current = inner.current_sha(path);
        if current.as_deref() != expected_sha {
            return Err(StoreError::Conflict { path: path.into() });
        }

        inner.files.insert(path.into(), content.to_vec());
        inner.commits.push(message.into());

        Ok(WriteReceipt {
            path: path.into(),
            sha: blob_sha(content),
        })
    }

    #[instrument(skip(self, expected_sha), level = "debug")]
    async fn remove(&self, path: &str, expected_sha: &str, message: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.take_fault(Fault::Remove)?;

        match inner.current_sha(path) {
            None => Err(StoreError::NotFound { path: path.into() }),
            Some(sha) if sha != expected_sha => Err(StoreError::Conflict { path: path.into() }),
            Some(_) => {
                inner.files.remove(path);
                inner.commits.push(message.into());
                Ok(())
            }
        }
    }
}

/// Compute Git blob SHA-1 of content.
pub fn blob_sha(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn child_of<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }

    path.strip_prefix(dir)?.strip_prefix('/')
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.into()
    } else {
        format!("{dir}/{name}")
    }
}
