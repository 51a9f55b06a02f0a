// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Well-known cloud sync folders.
//!
//! Users who keep their private root in a sync folder get it found without any
//! configuration. Each provider maps to one or more wildcard patterns, since
//! some providers put an account name into the mount point.

use serde::Serialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// Folder name expected inside every cloud location.
pub const CLOUD_FOLDER_NAME: &str = "dotfiles-local";

/// Cloud sync provider that holds a private root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    ICloud,
    Dropbox,
    GoogleDrive,
    OneDrive,
    NetworkVolume,
}

impl Display for CloudProvider {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::ICloud => "iCloud",
            Self::Dropbox => "Dropbox",
            Self::GoogleDrive => "Google Drive",
            Self::OneDrive => "OneDrive",
            Self::NetworkVolume => "network volume",
        })
    }
}

/// One place to look for a private root in cloud storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudCandidate {
    /// Provider that owns the location.
    pub provider: CloudProvider,

    /// Glob pattern of the location.
    pub pattern: String,
}

impl CloudCandidate {
    /// Construct new cloud candidate.
    pub fn new(provider: CloudProvider, pattern: impl Into<String>) -> Self {
        Self {
            provider,
            pattern: pattern.into(),
        }
    }

    /// Standard candidate list, in probing order.
    ///
    /// Home directory is escaped, so only the wildcards written here are
    /// treated as wildcards.
    pub fn defaults(home: &Path) -> Vec<Self> {
        let home = glob::Pattern::escape(&home.to_string_lossy());
        let folder = CLOUD_FOLDER_NAME;

        vec![
            Self::new(
                CloudProvider::ICloud,
                format!("{home}/Library/Mobile Documents/com~apple~CloudDocs/{folder}"),
            ),
            Self::new(CloudProvider::Dropbox, format!("{home}/Dropbox/{folder}")),
            Self::new(
                CloudProvider::GoogleDrive,
                format!("{home}/Library/CloudStorage/GoogleDrive-*/My Drive/{folder}"),
            ),
            Self::new(
                CloudProvider::GoogleDrive,
                format!("{home}/Google Drive/My Drive/{folder}"),
            ),
            Self::new(
                CloudProvider::OneDrive,
                format!("{home}/Library/CloudStorage/OneDrive-*/{folder}"),
            ),
            Self::new(CloudProvider::OneDrive, format!("{home}/OneDrive/{folder}")),
            Self::new(CloudProvider::NetworkVolume, format!("/Volumes/*/{folder}")),
            Self::new(CloudProvider::NetworkVolume, format!("/mnt/*/{folder}")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_escape_home() {
        let candidates = CloudCandidate::defaults(Path::new("/home/[weird]"));
        assert_eq!(
            candidates[1],
            CloudCandidate::new(CloudProvider::Dropbox, "/home/[[]weird[]]/Dropbox/dotfiles-local")
        );
    }

    #[test]
    fn defaults_follow_provider_order() {
        let providers: Vec<_> = CloudCandidate::defaults(Path::new("/home/blah"))
            .into_iter()
            .map(|candidate| candidate.provider)
            .collect();
        let mut sorted = providers.clone();
        sorted.sort();
        assert_eq!(providers, sorted);
    }
}
