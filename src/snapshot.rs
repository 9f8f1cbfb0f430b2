// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Site configuration editing with manual restore points.
//!
//! Editing `_config.yml` or a theme configuration file is the easiest way to
//! break a Hexo build. The two files are written independently, so a crash
//! between both writes can also leave them inconsistent. Hexcms does not try
//! to make those writes atomic. Instead it takes a __snapshot__ of both files
//! before every configuration write, and promotes the current snapshot to
//! __last good__ once a build of the site succeeds. If a later build fails,
//! the user can restore the last good snapshot by hand.
//!
//! Snapshots live in the local state directory as two small JSON records,
//! `snapshot.json` and `last-good.json`. They are not versioned in any way.
//!
//! # See Also
//!
//! - [`crate::build::SuccessTracker`]

use crate::{
    config::HexoLayout,
    store::{FileStore, RemoteFile, StoreError, WriteReceipt},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, remove_file, write},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

const SNAPSHOT_FILE: &str = "snapshot.json";
const LAST_GOOD_FILE: &str = "last-good.json";

/// Label given to a snapshot once a build succeeded with it.
pub const LAST_GOOD_LABEL: &str = "last successful build";

/// Restorable copy of site and theme configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigSnapshot {
    /// Content of main site configuration.
    pub site_yaml: String,

    /// Revision token the site configuration had when snapshot was taken.
    pub site_sha: String,

    /// Path of theme configuration, empty if theme has none.
    #[serde(default)]
    pub theme_file: String,

    /// Content of theme configuration.
    #[serde(default)]
    pub theme_yaml: String,

    /// Revision token the theme configuration had when snapshot was taken.
    #[serde(default)]
    pub theme_sha: String,

    pub saved_at: DateTime<Utc>,

    /// Human readable reason for snapshot.
    pub label: String,
}

impl ConfigSnapshot {
    /// Check if snapshot holds a restorable site configuration.
    pub fn has_site(&self) -> bool {
        !self.site_yaml.is_empty() && !self.site_sha.is_empty()
    }

    /// Check if snapshot holds a restorable theme configuration.
    pub fn has_theme(&self) -> bool {
        !self.theme_yaml.is_empty() && !self.theme_file.is_empty()
    }
}

/// Local storage of current and last good snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotShelf {
    dir: PathBuf,
}

impl SnapshotShelf {
    /// Construct new shelf in state directory.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::CreateDir`] if directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        mkdirp::mkdirp(&dir).map_err(|source| SnapshotError::CreateDir {
            source,
            path: dir.clone(),
        })?;

        Ok(Self { dir })
    }

    /// Replace current snapshot.
    pub fn save(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.store_record(SNAPSHOT_FILE, snapshot)
    }

    /// Current snapshot, if any.
    pub fn current(&self) -> Result<Option<ConfigSnapshot>> {
        self.load_record(SNAPSHOT_FILE)
    }

    /// Last snapshot a build succeeded with, if any.
    pub fn last_good(&self) -> Result<Option<ConfigSnapshot>> {
        self.load_record(LAST_GOOD_FILE)
    }

    /// Promote current snapshot to last good.
    ///
    /// Does nothing if there is no current snapshot.
    #[instrument(skip(self), level = "debug")]
    pub fn mark_good(&self) -> Result<Option<ConfigSnapshot>> {
        let Some(mut snapshot) = self.current()? else {
            debug!("no snapshot to mark as good");
            return Ok(None);
        };

        snapshot.label = LAST_GOOD_LABEL.into();
        self.store_record(LAST_GOOD_FILE, &snapshot)?;
        info!("configuration of {} marked as last good", snapshot.saved_at);

        Ok(Some(snapshot))
    }

    /// Drop both snapshots.
    pub fn clear(&self) -> Result<()> {
        for name in [SNAPSHOT_FILE, LAST_GOOD_FILE] {
            let path = self.dir.join(name);
            match remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(SnapshotError::Remove { source, path }),
            }
        }

        Ok(())
    }

    fn store_record(&self, name: &str, snapshot: &ConfigSnapshot) -> Result<()> {
        let path = self.dir.join(name);
        let data = serde_json::to_string_pretty(snapshot)?;
        write(&path, data).map_err(|source| SnapshotError::Write { source, path })
    }

    fn load_record(&self, name: &str) -> Result<Option<ConfigSnapshot>> {
        let path = self.dir.join(name);
        let data = match read_to_string(&path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Read { source, path }),
        };

        // INVARIANT: Unreadable snapshots count as absent, they are advisory.
        match serde_json::from_str(&data) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                warn!("ignoring unreadable snapshot {path:?}: {error}");
                Ok(None)
            }
        }
    }
}

/// Theme configuration file found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeConfig {
    /// Theme name taken from site configuration.
    pub name: String,

    /// Path the theme configuration was found at.
    pub path: String,

    pub file: RemoteFile,
}

/// Site and theme configuration as currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFiles {
    pub site: RemoteFile,

    /// Theme name, if site configuration names one.
    pub theme_name: Option<String>,

    /// Theme configuration, if one of the candidate locations holds it.
    pub theme: Option<ThemeConfig>,
}

/// Editor of site and theme configuration.
///
/// Takes a snapshot on the shelf before every write.
#[derive(Debug, Clone)]
pub struct SiteConfigEditor<S>
where
    S: FileStore,
{
    store: S,
    layout: HexoLayout,
    shelf: SnapshotShelf,
}

impl<S> SiteConfigEditor<S>
where
    S: FileStore,
{
    /// Construct new site configuration editor.
    pub fn new(store: S, layout: HexoLayout, shelf: SnapshotShelf) -> Self {
        Self {
            store,
            layout,
            shelf,
        }
    }

    /// Snapshot shelf used by this editor.
    pub fn shelf(&self) -> &SnapshotShelf {
        &self.shelf
    }

    /// Load site configuration, and the configuration of its theme.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::Store`] if site configuration cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub async fn load(&self) -> Result<ConfigFiles> {
        let site = self.store.read(&self.layout.site_config).await?;
        let theme_name = theme_name(&site.content);
        let theme = match &theme_name {
            Some(name) => self.find_theme_config(name).await?,
            None => None,
        };

        Ok(ConfigFiles {
            site,
            theme_name,
            theme,
        })
    }

    /// Look theme configuration up in its candidate locations.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::Store`] if a lookup fails for any other
    ///   reason than the file being absent.
    pub async fn find_theme_config(&self, name: &str) -> Result<Option<ThemeConfig>> {
        for path in self.layout.theme_config_candidates(name) {
            match self.store.read(&path).await {
                Ok(file) => {
                    debug!("theme {name:?} configured at {path:?}");
                    return Ok(Some(ThemeConfig {
                        name: name.into(),
                        path,
                        file,
                    }));
                }
                Err(StoreError::NotFound { .. } | StoreError::NotAFile { .. }) => continue,
                Err(error) => return Err(error.into()),
            }
        }
        warn!("no configuration found for theme {name:?}");

        Ok(None)
    }

    /// Write new site configuration.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::Store`] with [`StoreError::Conflict`] if
    ///   site configuration changed since `current` was loaded.
    #[instrument(skip(self, current, yaml), level = "debug")]
    pub async fn save_site(&self, current: &ConfigFiles, yaml: &str) -> Result<WriteReceipt> {
        let path = self.layout.site_config.as_str();
        self.snapshot(current, Some(yaml), None, format!("before saving {path}"))?;
        let receipt = self
            .store
            .write(
                path,
                yaml.as_bytes(),
                Some(&current.site.sha),
                &format!("config: update {path}"),
            )
            .await?;
        info!("saved {path:?}");

        Ok(receipt)
    }

    /// Write new theme configuration.
    ///
    /// # Errors
    ///
    /// - Return [`SnapshotError::NoThemeConfig`] if no theme configuration
    ///   was found at load time.
    /// - Return [`SnapshotError::Store`] with [`StoreError::Conflict`] if
    ///   theme configuration changed since `current` was loaded.
    pub async fn save_theme(&self, current: &ConfigFiles, yaml: &str) -> Result<WriteReceipt> {
        let message = current
            .theme
            .as_ref()
            .map(|theme| format!("config: update {}", theme.path))
            .unwrap_or_default();
        self.save_theme_with_message(current, yaml, &message).await
    }

    /// Write new theme configuration with custom commit message.
    ///
    /// # Errors
    ///
    /// - Same as [`SiteConfigEditor::save_theme`].
    #[instrument(skip(self, current, yaml), level = "debug")]
    pub async fn save_theme_with_message(
        &self,
        current: &ConfigFiles,
        yaml: &str,
        message: &str,
    ) -> Result<WriteReceipt> {
        let theme = current.theme.as_ref().ok_or(SnapshotError::NoThemeConfig)?;
        self.snapshot(current, None, Some(yaml), format!("before saving {}", theme.path))?;
        let receipt = self
            .store
            .write(&theme.path, yaml.as_bytes(), Some(&theme.file.sha), message)
            .await?;
        info!("saved {:?}", theme.path);

        Ok(receipt)
    }

    /// Write snapshot content back to the store.
    ///
    /// Overwrites whatever is stored now, using its current revision token.
    /// The site configuration is restored first. A failure on the theme
    /// configuration leaves the site configuration restored.
    #[instrument(skip(self, snapshot), level = "debug")]
    pub async fn restore(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        if snapshot.has_site() {
            self.overwrite(&self.layout.site_config, &snapshot.site_yaml)
                .await?;
        }

        if snapshot.has_theme() {
            self.overwrite(&snapshot.theme_file, &snapshot.theme_yaml)
                .await?;
        }

        Ok(())
    }

    async fn overwrite(&self, path: &str, content: &str) -> Result<()> {
        let current = self.store.read(path).await?;
        if current.content == content {
            debug!("{path:?} already matches snapshot");
            return Ok(());
        }

        self.store
            .write(
                path,
                content.as_bytes(),
                Some(&current.sha),
                &format!("config: restore {path} to last good version"),
            )
            .await?;
        info!("restored {path:?}");

        Ok(())
    }

    fn snapshot(
        &self,
        current: &ConfigFiles,
        site_yaml: Option<&str>,
        theme_yaml: Option<&str>,
        label: String,
    ) -> Result<()> {
        let theme = current.theme.as_ref();
        let snapshot = ConfigSnapshot {
            site_yaml: site_yaml.unwrap_or(&current.site.content).into(),
            site_sha: current.site.sha.clone(),
            theme_file: theme.map(|theme| theme.path.clone()).unwrap_or_default(),
            theme_yaml: theme_yaml
                .map(ToString::to_string)
                .or_else(|| theme.map(|theme| theme.file.content.clone()))
                .unwrap_or_default(),
            theme_sha: theme.map(|theme| theme.file.sha.clone()).unwrap_or_default(),
            saved_at: Utc::now(),
            label,
        };

        self.shelf.save(&snapshot)
    }
}

/// Extract theme name from site configuration.
///
/// Looks for the first top-level `theme:` key only, the rest of the document
/// need not even be valid YAML.
pub fn theme_name(site_yaml: &str) -> Option<String> {
    site_yaml
        .lines()
        .find_map(|line| line.strip_prefix("theme:"))
        .map(|value| {
            let value = value.split(" #").next().unwrap_or_default().trim();
            value.trim_matches(|c| c == '"' || c == '\'').to_string()
        })
        .filter(|name| !name.is_empty())
}

/// Snapshot and site configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// State directory could not be created.
    #[error("failed to create state directory {path:?}")]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot could not be read.
    #[error("failed to read snapshot {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot could not be written.
    #[error("failed to write snapshot {path:?}")]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot could not be removed.
    #[error("failed to remove snapshot {path:?}")]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot could not be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Site has no theme configuration to save.
    #[error("theme configuration not found, set `theme:` in the site configuration first")]
    NoThemeConfig,

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    const SITE_YAML: &str = indoc! {r#"
        title: My Blog
        # theme: commented
        theme: butterfly
        deploy:
          type: git
    "#};

    fn editor(
        files: Vec<(&'static str, &'static str)>,
    ) -> anyhow::Result<(tempfile::TempDir, SiteConfigEditor<MemoryStore>)> {
        let dir = tempfile::tempdir()?;
        let shelf = SnapshotShelf::new(dir.path())?;
        let editor =
            SiteConfigEditor::new(MemoryStore::with_files(files), HexoLayout::default(), shelf);
        Ok((dir, editor))
    }

    #[test_case(SITE_YAML, Some("butterfly"); "plain")]
    #[test_case("theme: 'next'  # fancy\n", Some("next"); "quoted with comment")]
    #[test_case("theme:\n", None; "empty value")]
    #[test_case("title: no theme\n", None; "absent")]
    #[test]
    fn extract_theme_name(yaml: &str, expect: Option<&str>) {
        pretty_assertions::assert_eq!(theme_name(yaml).as_deref(), expect);
    }

    #[tokio::test]
    async fn load_prefers_root_theme_config() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![
            ("_config.yml", SITE_YAML),
            ("_config.butterfly.yml", "menu: root\n"),
            ("themes/butterfly/_config.yml", "menu: nested\n"),
        ])?;

        let files = editor.load().await?;
        let theme = files.theme.unwrap();
        assert_eq!(theme.path, "_config.butterfly.yml");
        assert_eq!(theme.file.content, "menu: root\n");

        Ok(())
    }

    #[tokio::test]
    async fn load_falls_back_to_theme_directory() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![
            ("_config.yml", SITE_YAML),
            ("themes/butterfly/_config.yml", "menu: nested\n"),
        ])?;

        let files = editor.load().await?;
        assert_eq!(files.theme_name.as_deref(), Some("butterfly"));
        assert_eq!(files.theme.unwrap().path, "themes/butterfly/_config.yml");

        Ok(())
    }

    #[tokio::test]
    async fn save_theme_without_theme_config_fails() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![("_config.yml", "title: x\n")])?;
        let files = editor.load().await?;
        assert_eq!(files.theme, None);

        let result = editor.save_theme(&files, "menu: x\n").await;
        assert!(matches!(result, Err(SnapshotError::NoThemeConfig)));

        Ok(())
    }

    #[tokio::test]
    async fn save_records_snapshot_before_write() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![
            ("_config.yml", SITE_YAML),
            ("_config.butterfly.yml", "menu: root\n"),
        ])?;
        let files = editor.load().await?;

        editor.save_site(&files, "title: Changed\ntheme: butterfly\n").await?;

        let snapshot = editor.shelf().current()?.unwrap();
        assert_eq!(snapshot.site_yaml, "title: Changed\ntheme: butterfly\n");
        assert_eq!(snapshot.site_sha, files.site.sha);
        assert_eq!(snapshot.theme_file, "_config.butterfly.yml");
        assert_eq!(snapshot.theme_yaml, "menu: root\n");
        assert_eq!(editor.shelf().last_good()?, None);

        Ok(())
    }

    #[tokio::test]
    async fn stale_site_config_conflicts() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![("_config.yml", SITE_YAML)])?;
        let files = editor.load().await?;
        editor.save_site(&files, "title: First\n").await?;

        let result = editor.save_site(&files, "title: Second\n").await;
        assert!(matches!(
            result,
            Err(SnapshotError::Store(StoreError::Conflict { .. }))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn restore_last_good_snapshot() -> anyhow::Result<()> {
        let (_dir, editor) = editor(vec![
            ("_config.yml", SITE_YAML),
            ("_config.butterfly.yml", "menu: root\n"),
        ])?;
        let files = editor.load().await?;
        editor.save_theme(&files, "menu: good\n").await?;
        let good = editor.shelf().mark_good()?.unwrap();
        assert_eq!(good.label, LAST_GOOD_LABEL);

        let files = editor.load().await?;
        editor.save_theme(&files, "menu: broken\n").await?;

        editor.restore(&editor.shelf().last_good()?.unwrap()).await?;
        let files = editor.load().await?;
        assert_eq!(files.site.content, SITE_YAML);
        assert_eq!(files.theme.unwrap().file.content, "menu: good\n");

        Ok(())
    }

    #[test]
    fn unreadable_snapshot_counts_as_absent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let shelf = SnapshotShelf::new(dir.path())?;
        write(dir.path().join(SNAPSHOT_FILE), "{ not json")?;

        assert_eq!(shelf.current()?, None);
        assert_eq!(shelf.mark_good()?, None);

        shelf.clear()?;
        Ok(())
    }
}
