// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Site build status.
//!
//! A Hexo site backed by GitHub is usually rebuilt by a GitHub Actions
//! workflow on every push, so every commit hexcms makes kicks off a build.
//! This module polls the recent workflow runs of the backing repository, and
//! tracks when the latest build turns successful so the configuration
//! snapshot it was built with can be promoted to "last good".
//!
//! Build status is advisory. Failing to fetch runs never fails the caller, it
//! just yields an empty page.
//!
//! # See Also
//!
//! - [GitHub REST API - Workflow runs](https://docs.github.com/en/rest/actions/workflow-runs)

use crate::{
    snapshot::{SnapshotError, SnapshotShelf},
    store::{GitHubStore, StoreError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Poll interval while some run is queued or in progress.
pub const ACTIVE_INTERVAL: Duration = Duration::from_secs(8);

/// Default poll interval while nothing is running.
pub const IDLE_INTERVAL: Duration = Duration::from_secs(30);

/// Number of runs fetched per poll.
pub const RECENT_RUNS: u8 = 5;

/// Progress of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,

    /// Waiting, requested, pending, and whatever GitHub adds next.
    #[serde(other)]
    Pending,
}

/// Outcome of a completed workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    #[serde(other)]
    Other,
}

/// Single workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "WireRun")]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub status: RunStatus,

    /// `None` until run completes.
    pub conclusion: Option<RunConclusion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Run page on GitHub.
    pub html_url: String,

    /// First line of the commit message that triggered run.
    pub head_commit_message: Option<String>,
}

impl WorkflowRun {
    /// Check if run is queued or in progress.
    pub fn is_active(&self) -> bool {
        self.status != RunStatus::Completed
    }

    /// Check if run completed successfully.
    pub fn is_success(&self) -> bool {
        self.conclusion == Some(RunConclusion::Success)
    }

    /// Check if run failed or timed out.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.conclusion,
            Some(RunConclusion::Failure | RunConclusion::TimedOut)
        )
    }
}

#[derive(Deserialize)]
struct WireRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    status: RunStatus,
    #[serde(default)]
    conclusion: Option<RunConclusion>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
    #[serde(default)]
    head_commit: Option<WireCommit>,
    #[serde(default)]
    head_commit_message: Option<String>,
}

#[derive(Deserialize)]
struct WireCommit {
    message: String,
}

impl From<WireRun> for WorkflowRun {
    fn from(wire: WireRun) -> Self {
        let head_commit_message = wire
            .head_commit
            .map(|commit| commit.message)
            .or(wire.head_commit_message)
            .and_then(|message| message.lines().next().map(str::to_string));

        Self {
            id: wire.id,
            name: wire.name,
            status: wire.status,
            conclusion: wire.conclusion,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            html_url: wire.html_url,
            head_commit_message,
        }
    }
}

/// Page of workflow runs, newest first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RunPage {
    #[serde(rename = "workflow_runs")]
    pub runs: Vec<WorkflowRun>,

    /// Number of runs across all pages.
    #[serde(rename = "total_count")]
    pub total: u64,
}

/// Provider of workflow runs.
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Fetch one page of runs, newest first. Pages start at 1.
    async fn fetch_runs(&self, per_page: u8, page: u32) -> Result<RunPage>;
}

#[async_trait]
impl RunSource for GitHubStore {
    async fn fetch_runs(&self, per_page: u8, page: u32) -> Result<RunPage> {
        let url = self.repo_url("/actions/runs");
        let query = [
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        Ok(self.get_json(&url, &query).await?)
    }
}

#[async_trait]
impl<R> RunSource for std::sync::Arc<R>
where
    R: RunSource + ?Sized,
{
    async fn fetch_runs(&self, per_page: u8, page: u32) -> Result<RunPage> {
        (**self).fetch_runs(per_page, page).await
    }
}

/// Poll workflow runs of backing repository.
#[derive(Debug, Clone)]
pub struct BuildMonitor<R = GitHubStore>
where
    R: RunSource,
{
    source: R,
}

impl<R> BuildMonitor<R>
where
    R: RunSource,
{
    /// Construct new build monitor.
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Fetch recent runs.
    ///
    /// Any failure yields an empty page, and a warning.
    #[instrument(skip(self), level = "debug")]
    pub async fn recent_runs(&self, per_page: u8, page: u32) -> RunPage {
        match self.source.fetch_runs(per_page, page.max(1)).await {
            Ok(page) => page,
            Err(error) => {
                warn!("cannot fetch build status: {error}");
                RunPage::default()
            }
        }
    }

    /// Fetch the most recent run, if any.
    pub async fn latest_run(&self) -> Option<WorkflowRun> {
        self.recent_runs(1, 1).await.runs.into_iter().next()
    }

    /// Poll recent runs until cancelled.
    ///
    /// Calls `on_update` with every fetched page. Polls every
    /// [`ACTIVE_INTERVAL`] while a run is queued or in progress, and every
    /// `idle` otherwise. A zero `idle` interval stops watching as soon as no
    /// run is active. Returns once `cancel` fires, without waiting out the
    /// current interval.
    pub async fn watch<F>(&self, idle: Duration, cancel: CancellationToken, mut on_update: F)
    where
        F: FnMut(&[WorkflowRun]) + Send,
    {
        loop {
            let page = tokio::select! {
                _ = cancel.cancelled() => break,
                page = self.recent_runs(RECENT_RUNS, 1) => page,
            };
            on_update(&page.runs);

            let interval = if page.runs.iter().any(WorkflowRun::is_active) {
                ACTIVE_INTERVAL
            } else if idle.is_zero() {
                debug!("no active runs, stop watching");
                break;
            } else {
                idle
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("build watch finished");
    }
}

/// Promote configuration snapshots once builds succeed.
///
/// Remembers the latest run of the previous observation. The current snapshot
/// is marked good when the latest run is successful, and either no run was
/// observed before, or the same run was observed before as not yet
/// successful.
#[derive(Debug, Clone)]
pub struct SuccessTracker {
    shelf: SnapshotShelf,
    previous: Option<WorkflowRun>,
}

impl SuccessTracker {
    /// Construct new success tracker.
    pub fn new(shelf: SnapshotShelf) -> Self {
        Self {
            shelf,
            previous: None,
        }
    }

    /// Observe a fresh page of runs, newest first.
    ///
    /// Returns `true` if the current snapshot was marked good.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::Snapshot`] if snapshot cannot be promoted.
    pub fn observe(&mut self, runs: &[WorkflowRun]) -> Result<bool> {
        let latest = runs.first().cloned();
        let previous = std::mem::replace(&mut self.previous, latest.clone());

        let Some(latest) = latest.filter(WorkflowRun::is_success) else {
            return Ok(false);
        };

        let turned_green = match previous {
            None => true,
            Some(previous) => previous.id == latest.id && !previous.is_success(),
        };
        if !turned_green {
            return Ok(false);
        }

        let marked = self.shelf.mark_good()?.is_some();
        if marked {
            info!("build {} succeeded, configuration marked as last good", latest.id);
        }

        Ok(marked)
    }

    /// Check if user should be offered to restore last good configuration.
    ///
    /// That is the case when the latest run failed or timed out, and a last
    /// good snapshot exists.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::Snapshot`] if snapshot cannot be read.
    pub fn needs_restore_prompt(&self, latest: Option<&WorkflowRun>) -> Result<bool> {
        if !latest.is_some_and(WorkflowRun::is_failure) {
            return Ok(false);
        }

        Ok(self.shelf.last_good()?.is_some())
    }
}

/// Build status error types.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Runs could not be fetched.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Snapshot could not be read or promoted.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Friendly result alias :3
pub type Result<T, E = BuildError> = std::result::Result<T, E>;
