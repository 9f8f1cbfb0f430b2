// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where hexcms keeps its local state: the sealed credential, the
//! cleartext key that seals it, the site definition, and config snapshots.

use std::path::PathBuf;

/// Environment variable that overrides the local state directory.
pub const STATE_DIR_ENV: &str = "HEXCMS_STATE_DIR";

/// Determine absolute path to local state directory.
///
/// Uses `$HEXCMS_STATE_DIR` when set, after shell expansion. Otherwise falls
/// back to `$XDG_DATA_HOME/hexcms`. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if the override cannot be expanded.
/// - Return [`PathError::NoWayHome`] if data directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::full(&dir)?.into_owned()));
        }
    }

    dirs::data_dir()
        .map(|path| path.join("hexcms"))
        .ok_or(PathError::NoWayHome)
}

/// Path resolution error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's data directory.
    ///
    /// # See Also
    ///
    /// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
    #[error("cannot determine absolute path to user's data directory")]
    NoWayHome,

    /// Failed to perform shell expansion on state directory override.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
