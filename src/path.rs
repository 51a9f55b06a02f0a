// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the fixed locations dotlocal works with: the user's home
//! directory, the public dotfiles tree, the machine-local configuration file,
//! and the standard location of the private root.

use std::path::{Path, PathBuf};

/// Name of the machine-local configuration file inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".dotfiles.conf";

/// Name of the default public dotfiles tree inside the home directory.
pub const PUBLIC_ROOT_NAME: &str = ".dotfiles";

/// Name of the standard private root inside the home directory.
pub const STANDARD_ROOT_NAME: &str = ".dotfiles-local";

/// Name of the entry inside the public tree that points at the private root.
pub const LOCAL_LINK_NAME: &str = "local";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Set of locations every dotlocal operation is evaluated against.
///
/// Nothing here is checked for existence. The layout is a plain description
/// of where things are expected to be, so tests can point it at scratch
/// directories instead of the real home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// User's home directory, where public and local links are placed.
    pub home: PathBuf,

    /// Public dotfiles tree.
    pub public_root: PathBuf,

    /// Machine-local `KEY=VALUE` configuration file.
    pub config_file: PathBuf,
}

impl Layout {
    /// Construct new layout from home directory and public tree.
    ///
    /// Configuration file is placed at `<home>/.dotfiles.conf`.
    pub fn new(home: impl Into<PathBuf>, public_root: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let config_file = home.join(CONFIG_FILE_NAME);

        Self {
            home,
            public_root: public_root.into(),
            config_file,
        }
    }

    /// Construct layout for current user.
    ///
    /// Uses `<home>/.dotfiles` as the public tree when none is given.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn try_default(public_root: Option<PathBuf>) -> Result<Self> {
        let home = home_dir()?;
        let public_root = public_root.unwrap_or_else(|| home.join(PUBLIC_ROOT_NAME));

        Ok(Self::new(home, public_root))
    }

    /// Override configuration file location.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    /// Entry in the public tree that links to the private root.
    pub fn local_link(&self) -> PathBuf {
        self.public_root.join(LOCAL_LINK_NAME)
    }

    /// Standard location of the private root.
    pub fn standard_root(&self) -> PathBuf {
        self.home.join(STANDARD_ROOT_NAME)
    }

    /// Treat home directory as [`Path`] slice.
    pub fn home(&self) -> &Path {
        self.home.as_path()
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn default_layout_uses_home() -> anyhow::Result<()> {
        let result = Layout::try_default(None)?;
        let expect = Layout {
            home: "/home/blah".into(),
            public_root: "/home/blah/.dotfiles".into(),
            config_file: "/home/blah/.dotfiles.conf".into(),
        };
        assert_eq!(result, expect);
        assert_eq!(result.standard_root(), PathBuf::from("/home/blah/.dotfiles-local"));

        Ok(())
    }

    #[test]
    fn explicit_public_root() {
        let layout = Layout::new("/home/blah", "/srv/dotfiles");
        assert_eq!(layout.local_link(), PathBuf::from("/srv/dotfiles/local"));
        assert_eq!(layout.config_file, PathBuf::from("/home/blah/.dotfiles.conf"));
    }
}
