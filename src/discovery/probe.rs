// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem probing for discovery.
//!
//! Discovery only ever asks a handful of yes/no questions about the
//! filesystem. Those questions live behind [`Probe`] so that discovery can be
//! observed, or fed a fake filesystem, without touching its tier logic.

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Questions discovery asks about the filesystem.
///
/// No answer is ever cached by an implementation. Every call re-checks.
pub trait Probe {
    /// Where `path` points if it is a symlink, resolved against the link's
    /// directory. `None` if `path` is not a symlink.
    fn symlink_target(&self, path: &Path) -> Option<PathBuf>;

    /// Check that `path` is a directory itself, not a symlink to one.
    fn is_real_dir(&self, path: &Path) -> bool;

    /// Check that `path` resolves to a directory the current user can read
    /// and write.
    fn is_usable_dir(&self, path: &Path) -> bool;

    /// Expand wildcard pattern into existing paths, in sorted order.
    fn expand(&self, pattern: &str) -> Vec<PathBuf>;
}

/// Probe the real filesystem of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl Probe for HostProbe {
    fn symlink_target(&self, path: &Path) -> Option<PathBuf> {
        crate::symlink::resolved_target(path)
    }

    fn is_real_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_dir())
    }

    fn is_usable_dir(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };

        metadata.is_dir() && !metadata.permissions().readonly() && fs::read_dir(path).is_ok()
    }

    fn expand(&self, pattern: &str) -> Vec<PathBuf> {
        glob::glob(pattern)
            .map(|paths| paths.filter_map(Result::ok).collect())
            .unwrap_or_default()
    }
}
