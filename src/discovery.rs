// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Private root discovery.
//!
//! The private root can live almost anywhere, so dotlocal finds it through a
//! chain of __tiers__. Tiers are evaluated in a strict order, and the first
//! one that yields a readable and writable directory wins. Lower tiers are
//! never consulted once a higher one succeeds.
//!
//! 1. __Explicit config__: `DOTFILES_LOCAL_DIR` in the configuration file.
//! 2. __Existing symlink__: `<public>/local` is a symlink to a directory. A
//!    dangling symlink falls through instead of failing.
//! 3. __Existing directory__: `<public>/local` is a real directory.
//! 4. __Standard location__: `<home>/.dotfiles-local`.
//! 5. __Cloud auto-discovery__: well-known sync folders, see [`cloud`].
//!
//! Finding nothing is not an error. It just means no private root exists yet.
//!
//! # Memoization
//!
//! A [`Discovery`] session computes its answer once. Every later call returns
//! the same path and method, even if the filesystem changed in between, so all
//! callers within one process agree on where the private root is. Build a new
//! session, or call [`Discovery::clear_cache`], to look again.

pub mod cloud;
pub mod probe;

use crate::{
    config::Config,
    discovery::{
        cloud::{CloudCandidate, CloudProvider},
        probe::{HostProbe, Probe},
    },
    path::Layout,
};

use serde::{Serialize, Serializer};
use std::{
    cell::OnceCell,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{instrument, warn};

/// How the private root was found.
///
/// Variants are ordered by priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiscoveryMethod {
    ExplicitConfig,
    ExistingSymlink,
    ExistingDirectory,
    StandardLocation,
    CloudAutoDiscovery(CloudProvider),
    CreatedDefault,
    None,
}

impl DiscoveryMethod {
    /// Stable machine-readable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::ExplicitConfig => "explicit_config",
            Self::ExistingSymlink => "existing_symlink",
            Self::ExistingDirectory => "existing_directory",
            Self::StandardLocation => "standard_location",
            Self::CloudAutoDiscovery(_) => "cloud_auto_discovery",
            Self::CreatedDefault => "created_default",
            Self::None => "none",
        }
    }

    /// Check if method is weaker than explicit configuration.
    pub fn is_implicit(&self) -> bool {
        !matches!(self, Self::ExplicitConfig | Self::None)
    }
}

impl Display for DiscoveryMethod {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ExplicitConfig => fmt.write_str("dotfiles.conf (explicit configuration)"),
            Self::ExistingSymlink => fmt.write_str("existing symlink in dotfiles"),
            Self::ExistingDirectory => fmt.write_str("existing directory in dotfiles"),
            Self::StandardLocation => fmt.write_str("standard location"),
            Self::CloudAutoDiscovery(provider) => write!(fmt, "{provider} (auto-discovered)"),
            Self::CreatedDefault => fmt.write_str("created at standard location"),
            Self::None => fmt.write_str("not found"),
        }
    }
}

impl Serialize for DiscoveryMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of private root discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    /// Absolute path of private root, `None` when nothing was found.
    pub path: Option<PathBuf>,

    /// Tier that produced the path.
    pub method: DiscoveryMethod,

    /// Set when the value came out of the session cache.
    pub cached: bool,
}

impl ResolvedRoot {
    /// Construct result for a found private root.
    pub fn found(path: impl Into<PathBuf>, method: DiscoveryMethod) -> Self {
        Self {
            path: Some(path.into()),
            method,
            cached: false,
        }
    }

    /// Construct result for nothing found.
    pub fn none() -> Self {
        Self {
            path: None,
            method: DiscoveryMethod::None,
            cached: false,
        }
    }

    /// Treat private root as [`Path`] slice, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if a private root was found.
    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }
}

/// Discovery session.
///
/// Owns the memoized discovery result and the memoized configuration file for
/// as long as it lives. Construct one per process.
#[derive(Debug)]
pub struct Discovery<P = HostProbe>
where
    P: Probe,
{
    layout: Layout,
    probe: P,
    cloud: Vec<CloudCandidate>,
    config: OnceCell<Config>,
    resolved: OnceCell<ResolvedRoot>,
}

impl Discovery<HostProbe> {
    /// Construct new discovery session against the host filesystem.
    pub fn new(layout: Layout) -> Self {
        Self::with_probe(layout, HostProbe)
    }
}

impl<P> Discovery<P>
where
    P: Probe,
{
    /// Construct new discovery session with custom probe.
    pub fn with_probe(layout: Layout, probe: P) -> Self {
        let cloud = CloudCandidate::defaults(layout.home());

        Self {
            layout,
            probe,
            cloud,
            config: OnceCell::new(),
            resolved: OnceCell::new(),
        }
    }

    /// Replace cloud candidate list.
    pub fn with_cloud_candidates(mut self, candidates: impl IntoIterator<Item = CloudCandidate>) -> Self {
        self.cloud = candidates.into_iter().collect();
        self
    }

    /// Layout this session evaluates.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Probe this session asks.
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Configuration file, loaded once per session.
    ///
    /// An unreadable configuration file is treated as empty, since discovery
    /// can still succeed through lower tiers.
    pub fn config(&self) -> &Config {
        self.config.get_or_init(|| {
            Config::load(&self.layout.config_file).unwrap_or_else(|error| {
                warn!("{error}, ignoring it");
                Config::new()
            })
        })
    }

    /// Check if configuration file was loaded in this session.
    pub fn is_config_loaded(&self) -> bool {
        self.config.get().is_some()
    }

    /// Discover private root.
    ///
    /// The first call runs the tiers. Every later call returns the same
    /// result with [`ResolvedRoot::cached`] set, regardless of `verbose`.
    #[instrument(skip(self), level = "debug")]
    pub fn discover(&self, verbose: bool) -> ResolvedRoot {
        if let Some(resolved) = self.resolved.get() {
            diag!(verbose, "private root already resolved: {}", resolved.method);
            return ResolvedRoot {
                cached: true,
                ..resolved.clone()
            };
        }

        self.resolved.get_or_init(|| self.run_tiers(verbose)).clone()
    }

    /// Forget memoized discovery result and configuration.
    pub fn clear_cache(&mut self) {
        self.resolved = OnceCell::new();
        self.config = OnceCell::new();
    }

    fn run_tiers(&self, verbose: bool) -> ResolvedRoot {
        if let Some(path) = self.explicit_config(verbose) {
            return ResolvedRoot::found(path, DiscoveryMethod::ExplicitConfig);
        }

        if let Some(path) = self.existing_symlink(verbose) {
            return ResolvedRoot::found(path, DiscoveryMethod::ExistingSymlink);
        }

        if let Some(path) = self.existing_directory(verbose) {
            return ResolvedRoot::found(path, DiscoveryMethod::ExistingDirectory);
        }

        if let Some(path) = self.standard_location(verbose) {
            return ResolvedRoot::found(path, DiscoveryMethod::StandardLocation);
        }

        if let Some((provider, path)) = self.cloud_location(verbose) {
            return ResolvedRoot::found(path, DiscoveryMethod::CloudAutoDiscovery(provider));
        }

        diag!(verbose, "no private root found");
        ResolvedRoot::none()
    }

    fn explicit_config(&self, verbose: bool) -> Option<PathBuf> {
        let hint = match self.config().local_dir() {
            Ok(Some(hint)) => hint,
            Ok(None) => {
                diag!(verbose, "no explicit private root configured");
                return None;
            }
            Err(error) => {
                warn!("cannot expand configured private root: {error}");
                return None;
            }
        };

        // INVARIANT: Relative hints are relative to home, not to cwd.
        let path = if hint.is_relative() {
            self.layout.home.join(hint)
        } else {
            hint
        };

        if self.probe.is_usable_dir(&path) {
            diag!(verbose, "using configured private root {:?}", path.display());
            return Some(path);
        }

        warn!(
            "configured private root {:?} is not a usable directory",
            path.display()
        );
        None
    }

    fn existing_symlink(&self, verbose: bool) -> Option<PathBuf> {
        let link = self.layout.local_link();
        let target = self.probe.symlink_target(&link)?;

        if self.probe.is_usable_dir(&target) {
            diag!(verbose, "found private root through symlink {:?}", link.display());
            return Some(target);
        }

        diag!(
            verbose,
            "symlink {:?} points to unusable {:?}, ignoring it",
            link.display(),
            target.display()
        );
        None
    }

    fn existing_directory(&self, verbose: bool) -> Option<PathBuf> {
        let path = self.layout.local_link();
        if self.probe.is_real_dir(&path) && self.probe.is_usable_dir(&path) {
            diag!(verbose, "found private root directory {:?}", path.display());
            return Some(path);
        }

        None
    }

    fn standard_location(&self, verbose: bool) -> Option<PathBuf> {
        let path = self.layout.standard_root();
        if self.probe.is_usable_dir(&path) {
            diag!(verbose, "found private root at standard location {:?}", path.display());
            return Some(path);
        }

        None
    }

    fn cloud_location(&self, verbose: bool) -> Option<(CloudProvider, PathBuf)> {
        for candidate in &self.cloud {
            for path in self.probe.expand(&candidate.pattern) {
                if self.probe.is_usable_dir(&path) {
                    diag!(
                        verbose,
                        "auto-discovered private root in {}: {:?}",
                        candidate.provider,
                        path.display()
                    );
                    return Some((candidate.provider, path));
                }
            }
        }

        None
    }
}
