// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local credential vault.
//!
//! Keeps the store access token on disk in sealed form, next to the site
//! definition of the repository it belongs to.
//!
//! # Threat Model
//!
//! The AES-256-GCM key that seals the token is stored __in the clear__ in the
//! same directory as the sealed token. Anybody who can read the state
//! directory can recover the token. Sealing keeps the token out of casual
//! sight, e.g., `grep`, backups of a single file, or screen sharing. It does
//! not give confidentiality against a local attacker.
//!
//! # Failure Handling
//!
//! Any failure to unseal, be it corrupted data or a key that does not match,
//! wipes the key, the sealed token, and the site definition. The caller then
//! sees "no session" and must log in again. There is never a partially
//! restored session.

use crate::config::SiteDefinition;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::{read_to_string, remove_file, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

const KEY_FILE: &str = "key";
const TOKEN_FILE: &str = "token";
const SITE_FILE: &str = "site.toml";

/// Store access token.
///
/// Never shows up in debug output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Construct new credential from raw token text.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// Raw token text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if token is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("Credential(<redacted>)")
    }
}

/// Sealed credential storage in a local state directory.
#[derive(Debug, Clone)]
pub struct Vault {
    dir: PathBuf,
}

impl Vault {
    /// Open vault at state directory, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::CreateDir`] if directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        mkdirp::mkdirp(&dir).map_err(|source| VaultError::CreateDir {
            source,
            path: dir.clone(),
        })?;

        Ok(Self { dir })
    }

    /// State directory backing this vault.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load sealing key, generating and persisting a fresh one if none exists.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Read`] or [`VaultError::Write`] on I/O failure.
    /// - Return [`VaultError::Decryption`] if the stored key is malformed.
    ///   The vault is wiped in that case.
    #[instrument(skip(self), level = "debug")]
    pub fn unlock(&self) -> Result<Key<Aes256Gcm>> {
        let path = self.path(KEY_FILE);
        match self.read_optional(&path)? {
            Some(encoded) => match decode_key(&encoded) {
                Some(key) => Ok(key),
                None => {
                    warn!("stored key is malformed, wiping vault");
                    self.wipe()?;
                    Err(VaultError::Decryption)
                }
            },
            None => {
                let key = Aes256Gcm::generate_key(OsRng);
                self.write_private(&path, STANDARD.encode(key).as_bytes())?;
                debug!("generated new sealing key");
                Ok(key)
            }
        }
    }

    /// Seal plaintext with a fresh random nonce.
    ///
    /// Output is base64 of nonce followed by ciphertext. Sealing the same
    /// plaintext twice never yields the same output.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Encryption`] if the cipher fails.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(&self.unlock()?);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    /// Unseal text produced by [`Vault::seal`].
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Decryption`] if sealed text is corrupted or was
    ///   sealed with another key. The vault is wiped before returning.
    pub fn unseal(&self, sealed: &str) -> Result<String> {
        let key = self.unlock()?;
        match open_sealed(&key, sealed) {
            Some(plaintext) => Ok(plaintext),
            None => {
                warn!("cannot unseal credential, wiping vault");
                self.wipe()?;
                Err(VaultError::Decryption)
            }
        }
    }

    /// Seal and persist credential.
    #[instrument(skip(self, credential), level = "debug")]
    pub fn save_token(&self, credential: &Credential) -> Result<()> {
        let sealed = self.seal(credential.expose())?;
        self.write_private(&self.path(TOKEN_FILE), sealed.as_bytes())?;
        info!("credential saved");

        Ok(())
    }

    /// Load and unseal persisted credential.
    ///
    /// Yields `None` if no credential is stored, or if it could not be
    /// unsealed, in which case the vault has been wiped.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Read`] or [`VaultError::Remove`] on I/O failure.
    #[instrument(skip(self), level = "debug")]
    pub fn load_token(&self) -> Result<Option<Credential>> {
        let Some(sealed) = self.read_optional(&self.path(TOKEN_FILE))? else {
            return Ok(None);
        };

        match self.unseal(sealed.trim()) {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(VaultError::Decryption) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Persist site definition in the clear.
    pub fn save_site(&self, site: &SiteDefinition) -> Result<()> {
        self.write_private(&self.path(SITE_FILE), site.to_string().as_bytes())
    }

    /// Load persisted site definition, if any.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Site`] if stored definition is invalid.
    pub fn load_site(&self) -> Result<Option<SiteDefinition>> {
        self.read_optional(&self.path(SITE_FILE))?
            .map(|data| data.parse::<SiteDefinition>().map_err(VaultError::from))
            .transpose()
    }

    /// Remove key, sealed credential, and site definition.
    ///
    /// Missing files are fine.
    #[instrument(skip(self), level = "debug")]
    pub fn wipe(&self) -> Result<()> {
        for name in [KEY_FILE, TOKEN_FILE, SITE_FILE] {
            let path = self.path(name);
            match remove_file(&path) {
                Ok(()) => debug!("removed {path:?}"),
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(VaultError::Remove { source, path }),
            }
        }

        Ok(())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        match read_to_string(path) {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(VaultError::Read {
                source,
                path: path.into(),
            }),
        }
    }

    fn write_private(&self, path: &Path, data: &[u8]) -> Result<()> {
        let to_error = |source: std::io::Error| VaultError::Write {
            source,
            path: path.into(),
        };
        let mut file = private_options().open(path).map_err(to_error)?;
        file.write_all(data).map_err(to_error)?;

        // INVARIANT: Creation mode only applies to new files.
        restrict_permissions(path)
    }
}

fn decode_key(encoded: &str) -> Option<Key<Aes256Gcm>> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    if bytes.len() != KEY_SIZE {
        return None;
    }

    Some(*Key::<Aes256Gcm>::from_slice(&bytes))
}

fn open_sealed(key: &Key<Aes256Gcm>, sealed: &str) -> Option<String> {
    let bytes = STANDARD.decode(sealed.trim()).ok()?;
    if bytes.len() <= NONCE_SIZE {
        return None;
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let plaintext = Aes256Gcm::new(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()?;

    String::from_utf8(plaintext).ok()
}

#[cfg(unix)]
fn private_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::{
        fs::{set_permissions, Permissions},
        os::unix::fs::PermissionsExt,
    };

    set_permissions(path, Permissions::from_mode(0o600)).map_err(|source| VaultError::Write {
        source,
        path: path.into(),
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Credential vault error types.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// State directory could not be created.
    #[error("failed to create state directory {path:?}")]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file could not be read.
    #[error("failed to read {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file could not be written.
    #[error("failed to write {path:?}")]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file could not be removed.
    #[error("failed to remove {path:?}")]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Cipher refused to seal plaintext.
    #[error("failed to seal credential")]
    Encryption,

    /// Sealed data is corrupted or sealed with another key. Vault was wiped.
    #[error("stored credential is unreadable, please log in again")]
    Decryption,

    /// Stored site definition is invalid.
    #[error(transparent)]
    Site(#[from] crate::config::ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = VaultError> = std::result::Result<T, E>;
