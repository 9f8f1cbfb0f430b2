// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Login sessions.
//!
//! A [`Session`] is the one place that binds a validated credential to a
//! store client. It is constructed by logging in or by restoring a persisted
//! credential, and it hands out every service that needs store access. There
//! are no process-wide clients: dropping the session drops them all, and
//! logging out also wipes the persisted credential.

use crate::{
    asset::SiteAssets,
    build::{BuildMonitor, SuccessTracker},
    config::SiteDefinition,
    image::ImageUploader,
    post::PostManager,
    snapshot::{SiteConfigEditor, SnapshotError, SnapshotShelf},
    store::{github::GitHubUser, GitHubStore, StoreError},
    vault::{Credential, Vault, VaultError},
};

use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Store handle shared by all services of a session.
pub type SharedStore = Arc<GitHubStore>;

/// Authenticated access to one Hexo site.
#[derive(Debug, Clone)]
pub struct Session {
    vault: Vault,
    site: SiteDefinition,
    store: SharedStore,
    user: GitHubUser,
}

impl Session {
    /// Log in with access token.
    ///
    /// Validates token against the store first. Only a token that works gets
    /// sealed and persisted together with the site definition.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::MissingToken`] if token is blank.
    /// - Return [`SessionError::Rejected`] if the store rejects token.
    /// - Return [`SessionError::Store`] if the store cannot be reached.
    #[instrument(skip(vault, credential), fields(repo = %site.repository), level = "debug")]
    pub async fn login(vault: Vault, site: SiteDefinition, credential: Credential) -> Result<Self> {
        if credential.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let store = connect(&site, &credential)?;
        let user = match store.authenticated_user().await {
            Ok(user) => user,
            Err(StoreError::Unauthorized) => return Err(SessionError::Rejected),
            Err(error) => return Err(error.into()),
        };

        vault.save_token(&credential)?;
        vault.save_site(&site)?;
        info!("logged in as {}", user.login);

        Ok(Self {
            vault,
            site,
            store: Arc::new(store),
            user,
        })
    }

    /// Restore session from persisted credential.
    ///
    /// Yields `None` if nothing is persisted, if the credential cannot be
    /// unsealed, or if the store no longer accepts it. In the last two cases
    /// local state is wiped.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::Store`] if the store cannot be reached. Local
    ///   state stays untouched in that case.
    #[instrument(skip(vault), level = "debug")]
    pub async fn restore(vault: Vault) -> Result<Option<Self>> {
        let Some(site) = vault.load_site()? else {
            return Ok(None);
        };

        let Some(credential) = vault.load_token()? else {
            return Ok(None);
        };

        let store = connect(&site, &credential)?;
        let user = match store.authenticated_user().await {
            Ok(user) => user,
            Err(StoreError::Unauthorized) => {
                warn!("stored credential was revoked, please log in again");
                vault.wipe()?;
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Some(Self {
            vault,
            site,
            store: Arc::new(store),
            user,
        }))
    }

    /// End session, wiping persisted credential and site definition.
    pub fn logout(self) -> Result<()> {
        self.vault.wipe()?;
        info!("logged out {}", self.user.login);

        Ok(())
    }

    /// Account the session belongs to.
    pub fn user(&self) -> &GitHubUser {
        &self.user
    }

    /// Site the session edits.
    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }

    /// Store client of session.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Post lifecycle manager bound to session.
    pub fn posts(&self) -> PostManager<SharedStore> {
        PostManager::new(self.store(), self.site.layout.clone())
    }

    /// Site configuration editor bound to session.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::Snapshot`] if the snapshot shelf cannot be
    ///   set up in the state directory.
    pub fn config_editor(&self) -> Result<SiteConfigEditor<SharedStore>> {
        Ok(SiteConfigEditor::new(
            self.store(),
            self.site.layout.clone(),
            self.shelf()?,
        ))
    }

    /// Build monitor bound to session.
    pub fn builds(&self) -> BuildMonitor<SharedStore> {
        BuildMonitor::new(self.store())
    }

    /// Tracker that promotes configuration snapshots on successful builds.
    pub fn success_tracker(&self) -> Result<SuccessTracker> {
        Ok(SuccessTracker::new(self.shelf()?))
    }

    /// Image uploader bound to session.
    pub fn images(&self) -> ImageUploader<SharedStore> {
        ImageUploader::new(
            self.store(),
            self.site.repository.clone(),
            self.site.layout.clone(),
        )
    }

    /// Site asset manager bound to session.
    ///
    /// # Errors
    ///
    /// - Return [`SessionError::Snapshot`] if the snapshot shelf cannot be
    ///   set up in the state directory.
    pub fn assets(&self) -> Result<SiteAssets<SharedStore>> {
        Ok(SiteAssets::new(
            self.store(),
            self.site.layout.clone(),
            self.config_editor()?,
        ))
    }

    fn shelf(&self) -> Result<SnapshotShelf> {
        Ok(SnapshotShelf::new(self.vault.dir())?)
    }
}

fn connect(site: &SiteDefinition, credential: &Credential) -> Result<GitHubStore> {
    let store = GitHubStore::new(site.repository.clone(), credential.expose())?;
    Ok(match &site.api_base {
        Some(api_base) => store.with_api_base(api_base),
        None => store,
    })
}

/// Session error types.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No token given.
    #[error("access token must not be empty")]
    MissingToken,

    /// Store refused token.
    #[error("access token was rejected, check that it is valid and has repository access")]
    Rejected,

    /// Store could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Credential could not be persisted or loaded.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Snapshot shelf could not be set up.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Friendly result alias :3
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoCoordinates;

    #[tokio::test]
    async fn blank_token_is_rejected_before_any_request() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = Vault::open(dir.path())?;
        let site = SiteDefinition::new(RepoCoordinates::new("alice", "blog", "main"));

        let result = Session::login(vault.clone(), site, Credential::new("  ")).await;
        assert!(matches!(result, Err(SessionError::MissingToken)));
        assert_eq!(vault.load_token()?, None);

        Ok(())
    }

    #[tokio::test]
    async fn nothing_persisted_means_no_session() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = Vault::open(dir.path())?;
        assert!(Session::restore(vault).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_credential_means_no_session() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = Vault::open(dir.path())?;
        vault.save_site(&SiteDefinition::new(RepoCoordinates::new("alice", "blog", "main")))?;
        std::fs::write(dir.path().join("token"), "garbage")?;

        assert!(Session::restore(vault.clone()).await?.is_none());
        assert_eq!(vault.load_site()?, None);

        Ok(())
    }
}
