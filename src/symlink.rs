// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symbolic link primitives.
//!
//! Thin layer over the platform symlink calls. Every helper here is written to
//! be safe to race against another dotlocal process doing the same thing:
//! creation and removal treat "already in the desired state" as success.

use chrono::Local;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Create symlink at `link` pointing to `source`.
///
/// Parent directories of `link` are created when missing. If `link` already
/// exists and points at `source`, nothing happens.
///
/// # Errors
///
/// - Return [`SymlinkError::CreateParent`] if parent directory of link cannot
///   be created.
/// - Return [`SymlinkError::Create`] if symlink cannot be made.
pub fn create(source: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        mkdirp::mkdirp(parent).map_err(|err| SymlinkError::CreateParent {
            source: err,
            path: parent.into(),
        })?;
    }

    match platform_symlink(source, link) {
        Ok(()) => Ok(()),
        // INVARIANT: Another process beat us to it, fine if it did the same thing.
        Err(err) if err.kind() == ErrorKind::AlreadyExists && points_to(link, source) => {
            debug!("{:?} already linked by someone else", link.display());
            Ok(())
        }
        Err(err) => Err(SymlinkError::Create {
            source: err,
            link: link.into(),
            target: source.into(),
        }),
    }
}

/// Remove whatever occupies `path`.
///
/// Symlinks are unlinked without touching what they point to. Regular files
/// are deleted, directories are deleted recursively. A missing path counts as
/// already removed.
///
/// # Errors
///
/// - Return [`SymlinkError::Remove`] if entry cannot be removed.
pub fn remove(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(SymlinkError::Remove {
                source: err,
                path: path.into(),
            })
        }
    };

    let result = if metadata.is_symlink() {
        platform_unlink(path)
    } else if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SymlinkError::Remove {
            source: err,
            path: path.into(),
        }),
    }
}

/// Read where a symlink points, resolved against the link's own directory.
///
/// Return `None` if `path` is not a symlink.
pub fn resolved_target(path: &Path) -> Option<PathBuf> {
    let target = fs::read_link(path).ok()?;
    if target.is_absolute() {
        return Some(target);
    }

    Some(match path.parent() {
        Some(parent) => parent.join(target),
        None => target,
    })
}

/// Check if `link` is a symlink pointing exactly at `source`.
pub fn points_to(link: &Path, source: &Path) -> bool {
    resolved_target(link).is_some_and(|target| target == source)
}

/// Check if `path` is a symlink, dangling or not.
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_symlink())
}

/// Move whatever occupies `path` out of the way.
///
/// The entry is renamed to `<name>.backup-<timestamp>-<pid>` in the same
/// directory. Timestamp carries nanoseconds and process id so that two
/// processes backing up the same entry never pick the same name. Returns the
/// new location.
///
/// # Errors
///
/// - Return [`SymlinkError::RenameAside`] if entry cannot be renamed.
pub fn rename_aside(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d-%H%M%S-%f");
    let pid = std::process::id();

    let mut attempt = 0_u32;
    loop {
        let backup_name = match attempt {
            0 => format!("{name}.backup-{stamp}-{pid}"),
            n => format!("{name}.backup-{stamp}-{pid}-{n}"),
        };
        let backup = path.with_file_name(backup_name);

        // INVARIANT: Never clobber an earlier backup.
        if fs::symlink_metadata(&backup).is_ok() {
            attempt += 1;
            continue;
        }

        return match fs::rename(path, &backup) {
            Ok(()) => Ok(backup),
            Err(err) => Err(SymlinkError::RenameAside {
                source: err,
                path: path.into(),
            }),
        };
    }
}

#[cfg(unix)]
fn platform_symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn platform_symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, link)
    } else {
        std::os::windows::fs::symlink_file(source, link)
    }
}

#[cfg(unix)]
fn platform_unlink(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

#[cfg(windows)]
fn platform_unlink(path: &Path) -> std::io::Result<()> {
    // Directory symlinks must be removed as directories on Windows.
    fs::remove_dir(path).or_else(|_| fs::remove_file(path))
}

/// Symlink manipulation error types.
#[derive(Debug, thiserror::Error)]
pub enum SymlinkError {
    /// Parent directory of a link cannot be created.
    #[error("failed to create parent directory {:?}", path.display())]
    CreateParent {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to link {:?} to {:?}", link.display(), target.display())]
    Create {
        #[source]
        source: std::io::Error,
        link: PathBuf,
        target: PathBuf,
    },

    /// Existing entry cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Existing entry cannot be moved out of the way.
    #[error("failed to rename {:?} aside", path.display())]
    RenameAside {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SymlinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_is_idempotent() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join("source");
        let link = scratch.path().join("nested/dir/link");
        fs::write(&source, "hello")?;

        create(&source, &link)?;
        create(&source, &link)?;
        assert!(points_to(&link, &source));
        assert_eq!(fs::read_to_string(&link)?, "hello");

        Ok(())
    }

    #[test]
    fn create_refuses_foreign_entry() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join("source");
        let link = scratch.path().join("link");
        fs::write(&source, "hello")?;
        fs::write(&link, "mine")?;

        assert!(create(&source, &link).is_err());
        assert_eq!(fs::read_to_string(&link)?, "mine");

        Ok(())
    }

    #[test]
    fn remove_leaves_symlink_target_alone() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let source = scratch.path().join("source");
        let link = scratch.path().join("link");
        fs::create_dir(&source)?;
        fs::write(source.join("keep"), "data")?;
        create(&source, &link)?;

        remove(&link)?;
        remove(&link)?;
        assert!(!is_symlink(&link));
        assert!(source.join("keep").exists());

        Ok(())
    }

    #[test]
    fn rename_aside_never_collides() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join("README.md");

        fs::write(&path, "first")?;
        let first = rename_aside(&path)?;
        fs::write(&path, "second")?;
        let second = rename_aside(&path)?;

        assert!(!path.exists());
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(first)?, "first");
        assert_eq!(fs::read_to_string(second)?, "second");

        Ok(())
    }
}
