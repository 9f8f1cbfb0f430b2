// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Update check for hexcms itself.
//!
//! Asks the GitHub releases endpoint for the latest release first, and falls
//! back to the crates.io registry. Results are cached for a day in the local
//! state directory. Being offline is not an error: the check simply reports
//! that no update is available.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use reqwest::{header::ACCEPT, Client};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, remove_file, write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, instrument, warn};

/// Version of this build.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Latest release of hexcms on GitHub.
pub const RELEASES_URL: &str = "https://api.github.com/repos/awkless/hexcms/releases/latest";

/// Hexcms on the crates.io registry.
pub const REGISTRY_URL: &str = "https://crates.io/api/v1/crates/hexcms";

/// Timeout of each outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// How long a check result stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_FILE: &str = "version-check.json";

/// Outcome of an update check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionCheck {
    pub has_update: bool,
    pub current_version: String,
    pub latest_version: String,

    /// Where to get the latest version, empty if unknown.
    pub release_url: String,
    pub release_notes: String,
    pub checked_at: DateTime<Utc>,
}

impl VersionCheck {
    /// Result that reports no update, used when nothing could be fetched.
    pub fn up_to_date(current: &str) -> Self {
        Self {
            has_update: false,
            current_version: current.into(),
            latest_version: current.into(),
            release_url: String::new(),
            release_notes: String::new(),
            checked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CachedCheck {
    result: VersionCheck,
    cached_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RemoteRelease {
    version: String,
    url: String,
    notes: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(rename = "crate")]
    krate: RegistryCrate,
}

#[derive(Debug, Deserialize)]
struct RegistryCrate {
    name: String,
    max_stable_version: Option<String>,
    max_version: String,
}

/// Checks for newer releases of hexcms.
#[derive(Debug, Clone)]
pub struct VersionChecker {
    http: Client,
    current: String,
    releases_url: String,
    registry_url: String,
    cache_path: PathBuf,
}

impl VersionChecker {
    /// Construct new version checker caching into state directory.
    ///
    /// # Errors
    ///
    /// - Return [`VersionError::Client`] if HTTP client cannot be built.
    pub fn new(state_dir: impl AsRef<Path>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("hexcms/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            current: CURRENT_VERSION.into(),
            releases_url: RELEASES_URL.into(),
            registry_url: REGISTRY_URL.into(),
            cache_path: state_dir.as_ref().join(CACHE_FILE),
        })
    }

    /// Use other endpoints for releases and registry.
    pub fn with_endpoints(mut self, releases: impl Into<String>, registry: impl Into<String>) -> Self {
        self.releases_url = releases.into();
        self.registry_url = registry.into();
        self
    }

    /// Pretend to be another version.
    pub fn with_current(mut self, current: impl Into<String>) -> Self {
        self.current = current.into();
        self
    }

    /// Check for update, answering from cache while it is fresh.
    #[instrument(skip(self), level = "debug")]
    pub async fn check(&self) -> VersionCheck {
        if let Some(cached) = self.read_cache(Utc::now()) {
            debug!("using cached version check from {}", cached.checked_at);
            return cached;
        }

        let remote = match self.fetch_release().await {
            Some(remote) => Some(remote),
            None => self.fetch_registry().await,
        };

        let result = match remote {
            Some(remote) => VersionCheck {
                has_update: is_newer(&self.current, &remote.version),
                current_version: self.current.clone(),
                latest_version: remote.version,
                release_url: remote.url,
                release_notes: remote.notes,
                checked_at: Utc::now(),
            },
            None => VersionCheck::up_to_date(&self.current),
        };
        self.write_cache(&result);

        result
    }

    /// Drop cached result, so next check goes to the network.
    pub fn invalidate(&self) {
        if let Err(error) = remove_file(&self.cache_path) {
            debug!("no version cache to drop: {error}");
        }
    }

    async fn fetch_release(&self) -> Option<RemoteRelease> {
        let response = self
            .http
            .get(&self.releases_url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .inspect_err(|error| debug!("release lookup failed: {error}"))
            .ok()?;
        if !response.status().is_success() {
            debug!("release lookup answered {}", response.status());
            return None;
        }

        let release: GitHubRelease = response.json().await.ok()?;
        Some(RemoteRelease {
            version: release.tag_name.trim_start_matches('v').into(),
            url: release.html_url,
            notes: release.body.unwrap_or_default(),
        })
    }

    async fn fetch_registry(&self) -> Option<RemoteRelease> {
        let response = self
            .http
            .get(&self.registry_url)
            .send()
            .await
            .inspect_err(|error| debug!("registry lookup failed: {error}"))
            .ok()?;
        if !response.status().is_success() {
            debug!("registry lookup answered {}", response.status());
            return None;
        }

        let RegistryResponse { krate } = response.json().await.ok()?;
        Some(RemoteRelease {
            version: krate.max_stable_version.unwrap_or(krate.max_version),
            url: format!("https://crates.io/crates/{}", krate.name),
            notes: String::new(),
        })
    }

    fn read_cache(&self, now: DateTime<Utc>) -> Option<VersionCheck> {
        let data = read_to_string(&self.cache_path).ok()?;
        let cached: CachedCheck = serde_json::from_str(&data).ok()?;
        let ttl = TimeDelta::from_std(CACHE_TTL).ok()?;
        if now - cached.cached_at > ttl || cached.result.current_version != self.current {
            return None;
        }

        Some(cached.result)
    }

    fn write_cache(&self, result: &VersionCheck) {
        let cached = CachedCheck {
            result: result.clone(),
            cached_at: Utc::now(),
        };

        let outcome = serde_json::to_string(&cached)
            .map_err(VersionError::from)
            .and_then(|data| {
                write(&self.cache_path, data).map_err(|source| VersionError::Cache {
                    source,
                    path: self.cache_path.clone(),
                })
            });
        if let Err(error) = outcome {
            warn!("cannot cache version check: {error}");
        }
    }
}

/// Check if `latest` is strictly newer than `current`.
///
/// Accepts a leading `v`, ignores pre-release suffixes, and treats missing
/// minor or patch numbers as zero. Versions that still do not parse are
/// compared as plain text.
pub fn is_newer(current: &str, latest: &str) -> bool {
    match (core_version(current), core_version(latest)) {
        (Some(current), Some(latest)) => latest > current,
        _ => clean(latest) > clean(current),
    }
}

fn clean(version: &str) -> &str {
    let version = version.trim().trim_start_matches('v');
    version.split(['-', '+']).next().unwrap_or(version)
}

fn core_version(version: &str) -> Option<semver::Version> {
    let mut parts = clean(version).split('.');
    let mut next = || -> Option<u64> {
        match parts.next() {
            Some(part) => part.parse().ok(),
            None => Some(0),
        }
    };

    let (major, minor, patch) = (next()?, next()?, next()?);
    Some(semver::Version::new(major, minor, patch))
}

/// Version check error types.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] reqwest::Error),

    /// Cached result could not be encoded.
    #[error(transparent)]
    Encode(#[from] serde_json::Error),

    /// Cached result could not be stored.
    #[error("failed to write version cache {path:?}")]
    Cache {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = VersionError> = std::result::Result<T, E>;
