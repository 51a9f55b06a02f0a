// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Private root resolution façade.
//!
//! Ties discovery, infrastructure, and linking together into the handful of
//! operations callers actually want. Resolving a private root always leaves it
//! with its infrastructure in place, so nobody ever observes a private root
//! without its links.
//!
//! # Promotion
//!
//! A private root found in a cloud sync folder is written into the
//! configuration file as `DOTFILES_LOCAL_DIR`. Later runs then find it through
//! explicit configuration instead of probing cloud folders again. Promotion
//! only ever goes one way. Nothing removes the setting automatically.

use crate::{
    config::{Config, LOCAL_DIR_KEY},
    discovery::{
        probe::{HostProbe, Probe},
        Discovery, DiscoveryMethod, ResolvedRoot,
    },
    infra::{InfraError, Infrastructure},
    link::{LinkOptions, Linker, ReconcileReport},
    path::Layout,
};

use serde::Serialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Coarse kind of the current private root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Explicit,
    Symlink,
    Directory,
    Standard,
    None,
}

impl From<DiscoveryMethod> for RootKind {
    fn from(method: DiscoveryMethod) -> Self {
        match method {
            DiscoveryMethod::ExplicitConfig => Self::Explicit,
            DiscoveryMethod::ExistingSymlink => Self::Symlink,
            DiscoveryMethod::ExistingDirectory | DiscoveryMethod::CloudAutoDiscovery(_) => {
                Self::Directory
            }
            DiscoveryMethod::StandardLocation | DiscoveryMethod::CreatedDefault => Self::Standard,
            DiscoveryMethod::None => Self::None,
        }
    }
}

impl Display for RootKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Explicit => "explicit",
            Self::Symlink => "symlink",
            Self::Directory => "directory",
            Self::Standard => "standard",
            Self::None => "none",
        })
    }
}

/// Current resolution state, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootStatus {
    /// Resolved private root, if any.
    pub path: Option<PathBuf>,

    /// How the private root was found.
    pub method: DiscoveryMethod,

    /// Coarse kind of the private root.
    #[serde(rename = "type")]
    pub kind: RootKind,

    /// Whether the private root exists right now.
    pub exists: bool,
}

/// Private root resolver.
#[derive(Debug)]
pub struct Resolver<P = HostProbe>
where
    P: Probe,
{
    discovery: Discovery<P>,
}

impl Resolver<HostProbe> {
    /// Construct new resolver against the host filesystem.
    pub fn new(layout: Layout) -> Self {
        Self::with_discovery(Discovery::new(layout))
    }
}

impl<P> Resolver<P>
where
    P: Probe,
{
    /// Construct new resolver from existing discovery session.
    pub fn with_discovery(discovery: Discovery<P>) -> Self {
        Self { discovery }
    }

    /// Discovery session of this resolver.
    pub fn discovery(&self) -> &Discovery<P> {
        &self.discovery
    }

    /// Mutable discovery session of this resolver.
    pub fn discovery_mut(&mut self) -> &mut Discovery<P> {
        &mut self.discovery
    }

    /// Layout this resolver works on.
    pub fn layout(&self) -> &Layout {
        self.discovery.layout()
    }

    /// Infrastructure manager for a private root of this layout.
    pub fn infrastructure(&self, private_root: impl Into<PathBuf>) -> Infrastructure {
        Infrastructure::new(private_root, &self.layout().public_root)
    }

    /// Resolve private root, making sure its infrastructure exists.
    ///
    /// When nothing is found and `create_if_missing` is set, the standard
    /// location is created and used. A private root found in cloud storage is
    /// promoted into the configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::CreateDefault`] if standard location cannot be
    ///   created.
    /// - Return [`ResolveError::Infra`] if private root cannot be set up.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, create_if_missing: bool, verbose: bool) -> Result<ResolvedRoot> {
        let mut resolved = self.discovery.discover(verbose);

        if !resolved.is_found() {
            if !create_if_missing {
                diag!(verbose, "no private root, and not asked to create one");
                return Ok(resolved);
            }

            resolved = self.create_default()?;
        }

        let promotable = matches!(resolved.method, DiscoveryMethod::CloudAutoDiscovery(_));
        if let (true, false, Some(path)) = (promotable, resolved.cached, resolved.path()) {
            self.promote(path, verbose);
        }

        if let Some(path) = resolved.path() {
            self.infrastructure(path).ensure(false, verbose)?;
        }

        Ok(resolved)
    }

    /// Report current resolution state.
    ///
    /// Path and method come from the session. Existence is checked anew.
    pub fn status(&self) -> RootStatus {
        let resolved = self.discovery.discover(false);
        let exists = resolved.path().is_some_and(Path::is_dir);

        RootStatus {
            kind: RootKind::from(resolved.method),
            path: resolved.path,
            method: resolved.method,
            exists,
        }
    }

    /// Link public tree and private root into the home directory.
    ///
    /// A dry run only discovers the private root. It never creates it, nor
    /// its infrastructure.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::Infra`] if private root cannot be set up.
    pub fn reconcile(&self, options: LinkOptions, verbose: bool) -> Result<ReconcileReport> {
        let resolved = if options.dry_run {
            self.discovery.discover(verbose)
        } else {
            self.resolve(false, verbose)?
        };

        let layout = self.layout();
        Ok(Linker::new(&layout.home).reconcile(&layout.public_root, resolved.path(), options))
    }

    fn create_default(&self) -> Result<ResolvedRoot> {
        let path = self.layout().standard_root();
        mkdirp::mkdirp(&path).map_err(|err| ResolveError::CreateDefault {
            source: err,
            path: path.clone(),
        })?;
        info!("created private root at {:?}", path.display());

        Ok(ResolvedRoot::found(path, DiscoveryMethod::CreatedDefault))
    }

    fn promote(&self, path: &Path, verbose: bool) {
        let config_file = &self.layout().config_file;

        // INVARIANT: Re-read, never rewrite from the session's cached copy.
        let mut config = match Config::load(config_file) {
            Ok(config) => config,
            Err(error) => {
                warn!("not saving private root: {error}");
                return;
            }
        };

        config.set(LOCAL_DIR_KEY, path.to_string_lossy());
        match config.store(config_file) {
            Ok(()) => diag!(
                verbose,
                "saved private root {:?} to {:?}",
                path.display(),
                config_file.display()
            ),
            Err(error) => warn!("not saving private root: {error}"),
        }
    }
}

/// Resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Standard location cannot be created.
    #[error("failed to create private root at {:?}", path.display())]
    CreateDefault {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Private root infrastructure cannot be set up.
    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Friendly result alias :3
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
