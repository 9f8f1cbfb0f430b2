// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the site definition that hexcms persists next to the
//! sealed credential. File I/O is left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Site definition layout.
///
/// A __site definition__ names the repository that backs a Hexo blog, and
/// describes where the blog keeps its content inside that repository.
///
/// # General Layout
///
/// A site definition is composed of two basic parts: repository coordinates
/// and layout. The repository section says which owner, repository, and
/// branch every commit lands on. The layout section lists the directories and
/// files of the Hexo source tree. Every layout entry is optional, and falls
/// back to the stock Hexo layout.
///
/// An optional top-level `api_base` points hexcms at a GitHub Enterprise
/// installation instead of github.com.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SiteDefinition {
    /// Location of GitHub REST API, for GitHub Enterprise installations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Coordinates of backing repository.
    pub repository: RepoCoordinates,

    /// Location of Hexo content inside backing repository.
    #[serde(default)]
    pub layout: HexoLayout,
}

impl SiteDefinition {
    /// Construct new site definition with stock Hexo layout.
    pub fn new(repository: RepoCoordinates) -> Self {
        Self {
            api_base: None,
            repository,
            layout: HexoLayout::default(),
        }
    }
}

impl FromStr for SiteDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let definition: SiteDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Coordinates must name a real repository and branch.
        let repository = &definition.repository;
        for (field, value) in [
            ("owner", &repository.owner),
            ("repo", &repository.repo),
            ("branch", &repository.branch),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }

        Ok(definition)
    }
}

impl Display for SiteDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Repository coordinates.
///
/// Owner, repository, and branch of the backing store.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepoCoordinates {
    /// User or organization that owns the repository.
    pub owner: String,

    /// Name of the repository.
    pub repo: String,

    /// Branch every read and commit targets.
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl RepoCoordinates {
    /// Construct new repository coordinates.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl Default for RepoCoordinates {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
        }
    }
}

impl Display for RepoCoordinates {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

fn default_branch() -> String {
    "main".into()
}

/// Hexo source tree layout.
///
/// Draft and published state of a post is encoded by which of the two post
/// directories it lives in.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HexoLayout {
    /// Source directory Hexo copies to the site root.
    pub source: String,

    /// Directory of published posts.
    pub posts: String,

    /// Directory of draft posts.
    pub drafts: String,

    /// Directory of uploaded images and other assets.
    pub assets: String,

    /// Main Hexo configuration file.
    pub site_config: String,

    /// Directory of installed themes.
    pub themes: String,
}

impl HexoLayout {
    /// Directory that holds posts of given draft state.
    pub fn post_dir(&self, is_draft: bool) -> &str {
        if is_draft {
            self.drafts.as_str()
        } else {
            self.posts.as_str()
        }
    }

    /// Check if path lives in the drafts directory.
    pub fn is_draft_path(&self, path: &str) -> bool {
        path.strip_prefix(self.drafts.trim_end_matches('/'))
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Path of a file inside the source directory.
    pub fn source_path(&self, name: &str) -> String {
        format!("{}/{}", self.source.trim_end_matches('/'), name.trim_start_matches('/'))
    }

    /// Candidate locations of a theme's configuration file, in lookup order.
    pub fn theme_config_candidates(&self, theme: &str) -> [String; 2] {
        [
            format!("_config.{theme}.yml"),
            format!("{}/{theme}/_config.yml", self.themes.trim_end_matches('/')),
        ]
    }
}

impl Default for HexoLayout {
    fn default() -> Self {
        Self {
            source: "source".into(),
            posts: "source/_posts".into(),
            drafts: "source/_drafts".into(),
            assets: "source/assets".into(),
            site_config: "_config.yml".into(),
            themes: "themes".into(),
        }
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Required repository coordinate is blank.
    #[error("site definition is missing repository {0}")]
    MissingField(&'static str),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}
